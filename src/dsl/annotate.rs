//! A top-down pass tagging each leaf with `(parent_op, side)`. Two
//! independent contexts are threaded, one per scope, as explicit
//! parameters rather than mutable visitor state — the tree is consumed
//! once, so there's no benefit to a stateful visitor here.

use crate::dsl::ast::{Annotation, BoolOp, ColNode, ColumnTerm, DocNode, Side, Term};

/// Walks `tree` and returns a copy with every leaf's `annotation` field set.
pub fn annotate(tree: DocNode) -> DocNode {
    annotate_doc(tree, None)
}

fn annotate_doc(node: DocNode, ctx: Annotation) -> DocNode {
    match node {
        DocNode::Query(left, op, right) => {
            let left = annotate_doc(*left, Some((op, Side::Left)));
            let right = annotate_doc(*right, Some((op, Side::Right)));
            DocNode::Query(Box::new(left), op, Box::new(right))
        }
        // Under NOT, the side tag is inherited from the outer context:
        // filters don't meaningfully propagate across a negation anyway.
        DocNode::NotExpr(inner) => DocNode::NotExpr(Box::new(annotate_doc(*inner, ctx))),
        DocNode::Expr(inner) => DocNode::Expr(Box::new(annotate_doc(*inner, ctx))),
        DocNode::Term(Term::Keyword(mut kw)) => {
            kw.annotation = ctx;
            DocNode::Term(Term::Keyword(kw))
        }
        DocNode::Term(Term::Column(col)) => {
            DocNode::Term(Term::Column(Box::new(annotate_col(*col, None))))
        }
    }
}

fn annotate_col(node: ColNode, ctx: Annotation) -> ColNode {
    match node {
        ColNode::ColumnQuery(left, op, right) => {
            let left = annotate_col(*left, Some((op, Side::Left)));
            let right = annotate_col(*right, Some((op, Side::Right)));
            ColNode::ColumnQuery(Box::new(left), op, Box::new(right))
        }
        ColNode::NotColExpr(inner) => ColNode::NotColExpr(Box::new(annotate_col(*inner, ctx))),
        ColNode::ColExpr(inner) => ColNode::ColExpr(Box::new(annotate_col(*inner, ctx))),
        ColNode::ColumnTerm(ColumnTerm::Name(mut name)) => {
            name.annotation = ctx;
            ColNode::ColumnTerm(ColumnTerm::Name(name))
        }
        ColNode::ColumnTerm(ColumnTerm::Percentile(mut pct)) => {
            pct.annotation = ctx;
            ColNode::ColumnTerm(ColumnTerm::Percentile(pct))
        }
    }
}
