//! The parse tree. A tagged two-scope tree: `DocNode` for document scope,
//! `ColNode` for column scope, with the scope boundary exactly at the
//! column-term wrapper (`DocNode::Term(Term::Column(_))`). Keeping the two
//! scopes as distinct types avoids a "set of ids whose meaning depends on
//! the caller" shape.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    pub fn evaluate(self, value: f64, reference: f64) -> bool {
        match self {
            Cmp::Lt => value < reference,
            Cmp::Le => value <= reference,
            Cmp::Gt => value > reference,
            Cmp::Ge => value >= reference,
        }
    }
}

/// `(parent_op, side)` annotation attached to each leaf by the annotator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

pub type Annotation = Option<(BoolOp, Side)>;

/// A document-scope node.
#[derive(Debug, Clone)]
pub enum DocNode {
    Query(Box<DocNode>, BoolOp, Box<DocNode>),
    Expr(Box<DocNode>),
    NotExpr(Box<DocNode>),
    Term(Term),
}

/// A column-scope node, reachable only through `Term::Column`.
#[derive(Debug, Clone)]
pub enum ColNode {
    ColumnQuery(Box<ColNode>, BoolOp, Box<ColNode>),
    ColExpr(Box<ColNode>),
    NotColExpr(Box<ColNode>),
    ColumnTerm(ColumnTerm),
}

#[derive(Debug, Clone)]
pub enum Term {
    Keyword(KeywordTerm),
    Column(Box<ColNode>),
}

#[derive(Debug, Clone)]
pub enum ColumnTerm {
    Name(NameTerm),
    Percentile(PercentileTerm),
}

/// A raw Lucene-ish string, kept verbatim (not reparsed) so the full-text
/// backend receives the literal token span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTerm {
    pub lucene: String,
    pub annotation: Annotation,
}

impl KeywordTerm {
    pub fn new(lucene: impl Into<String>) -> Self {
        Self {
            lucene: lucene.into(),
            annotation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PercentileTerm {
    pub pctl: f64,
    pub cmp: Cmp,
    pub reference: f64,
    pub annotation: Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTerm {
    pub name: String,
    pub k: u32,
    pub annotation: Annotation,
}

impl DocNode {
    /// True if this subtree, after stripping `Expr` wrappers, is a single
    /// keyword term — the fusion target of the optimizer's keyword merge.
    pub fn as_single_keyword(&self) -> Option<&KeywordTerm> {
        match self {
            DocNode::Expr(inner) => inner.as_single_keyword(),
            DocNode::Term(Term::Keyword(kw)) => Some(kw),
            _ => None,
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "AND"),
            BoolOp::Or => write!(f, "OR"),
            BoolOp::Xor => write!(f, "XOR"),
        }
    }
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cmp::Lt => write!(f, "lt"),
            Cmp::Le => write!(f, "le"),
            Cmp::Gt => write!(f, "gt"),
            Cmp::Ge => write!(f, "ge"),
        }
    }
}
