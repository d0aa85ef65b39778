//! Parse-tree optimizer: keyword-subtree merging and cost-based AND
//! reordering, both bottom-up rewrites over the tree built by `parser`.

use crate::dsl::ast::{BoolOp, ColNode, DocNode, Term};

/// Leaf cost table for the reordering pass. Deliberately left tunable
/// rather than hard-coded, since the right constants depend on the actual
/// relative latency of each backend.
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub keyword: u32,
    pub name: u32,
    pub percentile: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            keyword: 10,
            name: 50,
            percentile: 100,
        }
    }
}

impl CostModel {
    fn doc_cost(&self, node: &DocNode) -> u32 {
        match node {
            DocNode::Query(a, _, b) => self.doc_cost(a).saturating_add(self.doc_cost(b)),
            DocNode::Expr(inner) | DocNode::NotExpr(inner) => self.doc_cost(inner),
            DocNode::Term(Term::Keyword(_)) => self.keyword,
            DocNode::Term(Term::Column(col)) => self.col_cost(col),
        }
    }

    fn col_cost(&self, node: &crate::dsl::ast::ColNode) -> u32 {
        use crate::dsl::ast::{ColNode, ColumnTerm};
        match node {
            ColNode::ColumnQuery(a, _, b) => self.col_cost(a).saturating_add(self.col_cost(b)),
            ColNode::ColExpr(inner) | ColNode::NotColExpr(inner) => self.col_cost(inner),
            ColNode::ColumnTerm(ColumnTerm::Name(_)) => self.name,
            ColNode::ColumnTerm(ColumnTerm::Percentile(_)) => self.percentile,
        }
    }
}

/// Both rewrites default on but are independently switchable, since either
/// one alone must still leave query semantics unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Optimizer {
    pub keyword_merging: bool,
    pub cost_reordering: bool,
    pub cost_model: CostModel,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            keyword_merging: true,
            cost_reordering: true,
            cost_model: CostModel::default(),
        }
    }
}

impl Optimizer {
    pub fn optimize(&self, tree: DocNode) -> DocNode {
        let tree = if self.keyword_merging {
            merge_keywords(tree)
        } else {
            tree
        };
        if self.cost_reordering {
            reorder_and(tree, &self.cost_model)
        } else {
            tree
        }
    }
}

/// Bottom-up fold that fuses adjacent single-keyword-term AND/OR siblings
/// into one `KeywordTerm`. XOR is excluded: Lucene has no native XOR to
/// delegate to.
fn merge_keywords(node: DocNode) -> DocNode {
    match node {
        DocNode::Query(left, op, right) => {
            let left = merge_keywords(*left);
            let right = merge_keywords(*right);
            if matches!(op, BoolOp::And | BoolOp::Or) {
                if let (Some(l), Some(r)) = (left.as_single_keyword(), right.as_single_keyword()) {
                    let fused = format!("{} {} {}", l.lucene, op, r.lucene);
                    return DocNode::Term(Term::Keyword(crate::dsl::ast::KeywordTerm::new(fused)));
                }
            }
            DocNode::Query(Box::new(left), op, Box::new(right))
        }
        DocNode::Expr(inner) => DocNode::Expr(Box::new(merge_keywords(*inner))),
        DocNode::NotExpr(inner) => DocNode::NotExpr(Box::new(merge_keywords(*inner))),
        leaf @ DocNode::Term(_) => leaf,
    }
}

/// At every AND node, put the cheaper child on the left so left-to-right
/// prefiltering at AND does the expensive side last with a small filter
/// already in hand. Applies in both scopes: a `query(a, op, b)` node is
/// either a document-scope `DocNode::Query` or, once inside a column
/// query, a column-scope `ColumnQuery` — the reordering rule doesn't
/// distinguish the two.
fn reorder_and(node: DocNode, costs: &CostModel) -> DocNode {
    match node {
        DocNode::Query(left, op, right) => {
            let left = reorder_and(*left, costs);
            let right = reorder_and(*right, costs);
            if op == BoolOp::And && costs.doc_cost(&right) < costs.doc_cost(&left) {
                DocNode::Query(Box::new(right), op, Box::new(left))
            } else {
                DocNode::Query(Box::new(left), op, Box::new(right))
            }
        }
        DocNode::Expr(inner) => DocNode::Expr(Box::new(reorder_and(*inner, costs))),
        // NOT is never reordered.
        DocNode::NotExpr(inner) => DocNode::NotExpr(inner),
        DocNode::Term(Term::Column(col)) => {
            DocNode::Term(Term::Column(Box::new(reorder_col_and(*col, costs))))
        }
        leaf @ DocNode::Term(_) => leaf,
    }
}

/// The column-scope mirror of [`reorder_and`].
fn reorder_col_and(node: ColNode, costs: &CostModel) -> ColNode {
    match node {
        ColNode::ColumnQuery(left, op, right) => {
            let left = reorder_col_and(*left, costs);
            let right = reorder_col_and(*right, costs);
            if op == BoolOp::And && costs.col_cost(&right) < costs.col_cost(&left) {
                ColNode::ColumnQuery(Box::new(right), op, Box::new(left))
            } else {
                ColNode::ColumnQuery(Box::new(left), op, Box::new(right))
            }
        }
        ColNode::ColExpr(inner) => ColNode::ColExpr(Box::new(reorder_col_and(*inner, costs))),
        ColNode::NotColExpr(inner) => ColNode::NotColExpr(inner),
        leaf @ ColNode::ColumnTerm(_) => leaf,
    }
}
