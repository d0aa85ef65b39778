//! Convenience re-exports of the types most callers need, gathered from
//! across the crate's modules.

pub use crate::column_index::{BruteForceColumnIndex, ColumnNameBackend, ColumnNameIndex, NamedColumn};
pub use crate::dsl::ast::{BoolOp, Cmp};
pub use crate::engine::{CacheInfo, ExecutionFlags, Highlights, QueryEngine};
pub use crate::error::{
    ColumnSearchError, EngineError, IndexingError, PercentilePredicateError, TransientBackendError,
};
pub use crate::fulltext::{
    FullTextConnector, FullTextResponse, FullTextSession, FullTextTransport, StubFullTextTransport,
};
pub use crate::ids::{ColId, DocId, HistId, IdMaps};
pub use crate::percentile::{FainderMode, Histogram, PercentileIndex, PercentileIndexConfig};
