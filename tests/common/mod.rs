//! Shared fixture for the end-to-end and property tests: three documents
//! (`0: weather/Germany`, `1: avocado`, `2: a-movie`), with two non-numeric
//! name-searchable columns (`Latitude`, `Longitude`, both owned by document
//! 0) and one numeric column per document.

use hashbrown::HashMap;
use std::sync::Arc;

use fainderql::column_index::{BruteForceColumnIndex, ColumnNameIndex, NamedColumn};
use fainderql::engine::QueryEngine;
use fainderql::fulltext::{FullTextConnector, FullTextResponse, StubFullTextTransport};
use fainderql::ids::IdMaps;
use fainderql::percentile::{Histogram, PercentileIndex, PercentileIndexConfig};

/// Document 0's numeric column: a uniform distribution over `[0, 100]`
/// whose median is ~50 (`pp(0.5;ge;20.0)` true, `pp(0.9;ge;1000000)` false).
fn weather_histogram() -> Histogram {
    let edges: Vec<f64> = (1..=10).map(|i| i as f64 * 10.0).collect();
    Histogram::from_counts(edges, vec![10; 10])
}

/// Document 1's numeric column: `pp(0.9;ge;1000000)` true,
/// `pp(0.99;ge;10000000)` false.
fn avocado_histogram() -> Histogram {
    Histogram::from_counts(vec![1_000_000.0, 2_000_000.0], vec![1, 9])
}

/// Document 2's numeric column: both `pp(0.9;ge;1000000)` and
/// `pp(0.99;ge;10000000)` true.
fn movie_histogram() -> Histogram {
    Histogram::from_counts(vec![1_000_000.0, 50_000_000.0], vec![1, 9])
}

pub fn fixture_engine() -> QueryEngine {
    let id_maps = IdMaps::builder()
        .add_column(0, 0) // Latitude
        .add_column(0, 1) // Longitude
        .add_numeric_column(0, 2, 0)
        .add_numeric_column(1, 3, 1)
        .add_numeric_column(2, 4, 2)
        .build();

    let mut hists = HashMap::new();
    hists.insert(0, weather_histogram());
    hists.insert(1, avocado_histogram());
    hists.insert(2, movie_histogram());
    let percentile = PercentileIndex::build(Some(hists), PercentileIndexConfig::default());

    let columns = ColumnNameIndex::new(Box::new(BruteForceColumnIndex::new(vec![
        NamedColumn { col: 0, name: "Latitude".into(), embedding: vec![1.0, 0.0] },
        NamedColumn { col: 1, name: "Longitude".into(), embedding: vec![0.0, 1.0] },
    ])));

    let mut responses = HashMap::new();
    responses.insert(
        "germany".to_string(),
        FullTextResponse { doc_ids: vec![0], scores: vec![1.0], highlights: vec![HashMap::new()] },
    );
    let fulltext = Arc::new(FullTextConnector::new(Arc::new(StubFullTextTransport::new(responses))));

    QueryEngine::new(id_maps, percentile, columns, fulltext, 16)
}
