//! The query engine facade. Owns the DSL front end, the three index
//! handles, the id-space maps, and the result cache. Index swaps are
//! guarded by a reader-preferring `parking_lot::RwLock` so queries never
//! block on each other while a rebuild is loading in the background.

pub mod cache;
pub mod executor;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::column_index::ColumnNameIndex;
use crate::dsl::{annotate, optimizer::Optimizer, parser};
use crate::error::EngineError;
use crate::fulltext::FullTextConnector;
use crate::ids::{DocId, IdMaps};
use crate::percentile::{FainderMode, PercentileIndex};

pub use cache::{CacheInfo, CacheKey, ResultCache};
pub use executor::{ExecutionFlags, Executor, Highlights};

/// The swappable index bundle. Everything here is replaced as one unit by
/// `update_indices`.
struct EngineIndices {
    id_maps: IdMaps,
    percentile: PercentileIndex,
    columns: ColumnNameIndex,
}

/// `Send + Sync`; callable concurrently.
pub struct QueryEngine {
    indices: RwLock<EngineIndices>,
    fulltext: Arc<FullTextConnector>,
    cache: ResultCache,
    optimizer: Optimizer,
}

impl QueryEngine {
    pub fn new(
        id_maps: IdMaps,
        percentile: PercentileIndex,
        columns: ColumnNameIndex,
        fulltext: Arc<FullTextConnector>,
        cache_size: usize,
    ) -> Self {
        Self {
            indices: RwLock::new(EngineIndices { id_maps, percentile, columns }),
            fulltext,
            cache: ResultCache::new(cache_size),
            optimizer: Optimizer::default(),
        }
    }

    /// Runs a query end to end, consulting the cache before parsing.
    pub fn execute(
        &self,
        query_text: &str,
        fainder_mode: FainderMode,
        enable_highlighting: bool,
        enable_filtering: bool,
        enable_merging: bool,
    ) -> Result<(Vec<DocId>, Highlights), EngineError> {
        let normalized = normalize(query_text);
        let key = CacheKey {
            query: normalized.clone(),
            fainder_mode,
            enable_highlighting,
            enable_filtering,
            enable_merging,
        };
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let tree = parser::parse(&normalized)?;
        let optimizer = Optimizer { keyword_merging: enable_merging, ..self.optimizer };
        let tree = optimizer.optimize(tree);
        let tree = annotate::annotate(tree);

        let guard = self.indices.read();
        let executor = Executor::new(
            &guard.id_maps,
            &guard.percentile,
            &guard.columns,
            &self.fulltext,
            ExecutionFlags { fainder_mode, enable_highlighting, enable_filtering },
        );
        let result = executor.run(&tree)?;
        drop(guard);

        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Atomically rebinds the index handles and clears the cache. The new
    /// indices must be fully loaded by the caller before this call — the
    /// write guard is held only for the swap itself.
    pub fn update_indices(
        &self,
        id_maps: IdMaps,
        percentile: PercentileIndex,
        columns: ColumnNameIndex,
    ) {
        {
            let mut guard = self.indices.write();
            *guard = EngineIndices { id_maps, percentile, columns };
        }
        self.cache.clear();
        info!("indices swapped, cache cleared");
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.cache.info()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Triggers full-text index recreation on the external backend;
    /// propagates [`crate::error::IndexingError`] on failure.
    pub fn recreate_fulltext_index(&self) -> Result<(), EngineError> {
        self.fulltext.recreate_index().map_err(EngineError::from)
    }
}

/// Canonicalizes whitespace so queries differing only in spacing hit the
/// same cache entry.
fn normalize(query_text: &str) -> String {
    let normalized = query_text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized != query_text {
        warn!("query text normalized for cache key");
    }
    normalized
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::column_index::{BruteForceColumnIndex, NamedColumn};
    use crate::fulltext::{FullTextResponse, StubFullTextTransport};
    use crate::percentile::{Histogram, PercentileIndexConfig};
    use hashbrown::HashMap as HbMap;

    fn fixture_engine() -> QueryEngine {
        let id_maps = IdMaps::builder()
            .add_column(0, 0)
            .add_numeric_column(0, 1, 0)
            .add_column(1, 2)
            .add_numeric_column(1, 3, 1)
            .build();

        let mut hists = HbMap::new();
        hists.insert(0, Histogram::from_counts(vec![10.0, 20.0], vec![1, 1]));
        hists.insert(1, Histogram::from_counts(vec![100.0, 1_000_000.0], vec![1, 1]));
        let percentile = PercentileIndex::build(Some(hists), PercentileIndexConfig::default());

        let columns = ColumnNameIndex::new(Box::new(BruteForceColumnIndex::new(vec![
            NamedColumn { col: 0, name: "Latitude".into(), embedding: vec![1.0, 0.0] },
            NamedColumn { col: 2, name: "Longitude".into(), embedding: vec![0.0, 1.0] },
        ])));

        let mut responses = HbMap::new();
        responses.insert(
            "germany".to_string(),
            FullTextResponse { doc_ids: vec![0], scores: vec![1.0], highlights: vec![HbMap::new()] },
        );
        let fulltext = Arc::new(FullTextConnector::new(Arc::new(StubFullTextTransport::new(responses))));

        QueryEngine::new(id_maps, percentile, columns, fulltext, 4)
    }

    #[test]
    fn keyword_query_resolves_via_fulltext_stub() {
        let engine = fixture_engine();
        let (docs, _) = engine
            .execute("kw(germany)", FainderMode::Exact, true, true, true)
            .unwrap();
        assert_eq!(docs, vec![0]);
    }

    #[test]
    fn repeated_execute_hits_cache() {
        let engine = fixture_engine();
        engine.execute("kw(germany)", FainderMode::Exact, true, true, true).unwrap();
        engine.execute("kw(germany)", FainderMode::Exact, true, true, true).unwrap();
        let info = engine.cache_info();
        assert_eq!(info.hits, 1);
        assert_eq!(info.misses, 1);
    }

    #[test]
    fn update_indices_clears_cache() {
        let engine = fixture_engine();
        engine.execute("kw(germany)", FainderMode::Exact, true, true, true).unwrap();
        assert_eq!(engine.cache_info().current_size, 1);

        let id_maps = IdMaps::builder().add_column(0, 0).build();
        let percentile = PercentileIndex::build(None, PercentileIndexConfig::default());
        let columns = ColumnNameIndex::new(Box::new(BruteForceColumnIndex::new(vec![])));
        engine.update_indices(id_maps, percentile, columns);

        assert_eq!(engine.cache_info().current_size, 0);
    }

    #[test]
    fn parse_error_surfaces_as_engine_error() {
        let engine = fixture_engine();
        let err = engine.execute("NOT", FainderMode::Exact, true, true, true).unwrap_err();
        assert!(matches!(err, EngineError::Parse { .. }));
    }
}
