//! A hybrid dataset-search query engine: a small DSL mixing full-text,
//! column-name nearest-neighbor, and per-column percentile predicates
//! across a document scope and a column scope, evaluated bottom-up against
//! three backing indices and memoized in a bounded result cache.
//!
//! Module layout:
//!
//! - [`ids`] — static id-space maps (`DocId`/`ColId`/`HistId`).
//! - [`percentile`] — the percentile index (four modes, parallel exact path).
//! - [`column_index`] — the column-name k-NN adapter.
//! - [`fulltext`] — the full-text connector.
//! - [`dsl`] — grammar/parser, optimizer, and leaf annotator.
//! - [`engine`] — executor, result cache, and the `QueryEngine` facade.

pub mod column_index;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod fulltext;
pub mod ids;
pub mod percentile;
pub mod prelude;
