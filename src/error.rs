//! Error taxonomy surfaced by the engine.

use thiserror::Error;

/// A position in the original query text, used by [`EngineError::Parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

/// Errors an RPC to the full-text backend can raise. Never surfaces past
/// [`crate::fulltext::FullTextConnector::evaluate`] — only `recreate_index`
/// propagates it, wrapped as [`EngineError::Indexing`].
#[derive(Debug, Error)]
pub enum TransientBackendError {
    #[error("full-text backend unavailable: {0}")]
    Unavailable(String),
    #[error("full-text backend returned malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error at {}:{}: {context}", .span.line, .span.column)]
    Parse { span: Span, context: String },

    #[error("invalid percentile predicate: {0}")]
    PercentilePredicate(#[from] PercentilePredicateError),

    #[error("column search error: {0}")]
    ColumnSearch(#[from] ColumnSearchError),

    #[error("indexing error: {0}")]
    Indexing(#[from] IndexingError),

    #[error("unknown error: {0}")]
    Unknown(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PercentilePredicateError {
    #[error("percentile must be in (0, 1], got {0}")]
    OutOfRange(f64),
    #[error("mode {mode:?} requires an index that is not loaded")]
    IndexNotLoaded { mode: crate::percentile::FainderMode },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnSearchError {
    #[error("column name query must not be empty")]
    EmptyName,
    #[error("column search mode not implemented: {0}")]
    ModeNotImplemented(String),
}

#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("failed to recreate full-text index: {0}")]
    RecreateFailed(String),
    #[error("failed to rebuild index: {0}")]
    RebuildFailed(String),
}
