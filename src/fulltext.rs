//! The full-text connector: an RPC client to the keyword-search backend.
//! This module defines the session/transport trait boundary plus a
//! fail-soft connector wrapping it — lazy connect, explicit close, and an
//! `evaluate` that degrades to an empty result on transport failure rather
//! than propagating, while `recreate_index` does propagate failures.

use crate::error::{IndexingError, TransientBackendError};
use crate::ids::DocId;
use hashbrown::HashMap;
use parking_lot::Mutex;
use roaring::RoaringBitmap;

/// One full-text evaluation's raw result: matched doc ids, their scores
/// (same length, same order), and per-doc field→snippet highlight maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullTextResponse {
    pub doc_ids: Vec<DocId>,
    pub scores: Vec<f64>,
    pub highlights: Vec<HashMap<String, String>>,
}

/// A live session with the full-text backend, obtained via
/// [`FullTextTransport::connect`]. Exposes the backend's two RPCs:
/// evaluating a query and recreating the index.
pub trait FullTextSession: Send {
    fn evaluate(
        &mut self,
        query: &str,
        doc_filter: Option<&RoaringBitmap>,
        highlight: bool,
    ) -> Result<FullTextResponse, TransientBackendError>;

    fn recreate_index(&mut self) -> Result<(), IndexingError>;
}

/// Lazily establishes a [`FullTextSession`], connecting on first use rather
/// than at construction.
pub trait FullTextTransport: Send + Sync {
    fn connect(&self) -> Result<Box<dyn FullTextSession>, TransientBackendError>;
}

/// Holds the transport plus a lazily-populated session, guarded by a mutex
/// for the explicit connect/close lifecycle.
pub struct FullTextConnector {
    transport: std::sync::Arc<dyn FullTextTransport>,
    session: Mutex<Option<Box<dyn FullTextSession>>>,
}

impl FullTextConnector {
    pub fn new(transport: std::sync::Arc<dyn FullTextTransport>) -> Self {
        Self { transport, session: Mutex::new(None) }
    }

    /// Drops the live session, forcing the next call to reconnect.
    pub fn close(&self) {
        *self.session.lock() = None;
    }

    /// Evaluates a query against the backend. Fail-soft: any transport or
    /// session error degrades to an empty result rather than propagating,
    /// so a transient backend outage never fails the whole query.
    pub fn evaluate(
        &self,
        query: &str,
        doc_filter: Option<&RoaringBitmap>,
        highlight: bool,
    ) -> FullTextResponse {
        let mut guard = self.session.lock();
        if guard.is_none() {
            match self.transport.connect() {
                Ok(session) => *guard = Some(session),
                Err(err) => {
                    tracing::warn!(%err, "full-text backend connect failed, degrading to empty result");
                    return FullTextResponse::default();
                }
            }
        }
        match guard.as_mut().unwrap().evaluate(query, doc_filter, highlight) {
            Ok(response) => response,
            Err(err) => {
                // A failed call invalidates the session so the next query
                // reconnects rather than retrying a dead channel.
                tracing::warn!(%err, query, "full-text evaluate failed, degrading to empty result");
                *guard = None;
                FullTextResponse::default()
            }
        }
    }

    /// Unlike `evaluate`, errors here propagate — this is a control call,
    /// not a query result.
    pub fn recreate_index(&self) -> Result<(), IndexingError> {
        let mut guard = self.session.lock();
        if guard.is_none() {
            *guard = Some(
                self.transport
                    .connect()
                    .map_err(|e| IndexingError::RecreateFailed(e.to_string()))?,
            );
        }
        guard.as_mut().unwrap().recreate_index()
    }
}

/// An in-memory test double for [`FullTextTransport`]/[`FullTextSession`],
/// keyed on the literal query string.
#[derive(Debug, Default)]
pub struct StubFullTextTransport {
    responses: HashMap<String, FullTextResponse>,
    fail: bool,
}

impl StubFullTextTransport {
    pub fn new(responses: HashMap<String, FullTextResponse>) -> Self {
        Self { responses, fail: false }
    }

    /// Builds a transport whose every session immediately fails, for
    /// testing the fail-soft contract.
    pub fn failing() -> Self {
        Self { responses: HashMap::new(), fail: true }
    }
}

struct StubSession {
    responses: HashMap<String, FullTextResponse>,
    fail: bool,
}

/// Resolves a query string against the stub's literal-keyword map,
/// falling back to evaluating merged boolean strings (`"a AND b"`,
/// `"a OR b"`, `"a XOR b"`, left-associative, no nesting — the shape
/// keyword fusion actually produces) the way a real Lucene-family
/// backend would evaluate a delegated boolean query rather than
/// treating it as an opaque literal.
fn resolve(responses: &HashMap<String, FullTextResponse>, query: &str) -> FullTextResponse {
    if let Some(hit) = responses.get(query) {
        return hit.clone();
    }

    let mut tokens = query.split_whitespace();
    let Some(first) = tokens.next() else { return FullTextResponse::default() };
    let mut acc = responses.get(first).cloned().unwrap_or_default();

    loop {
        let Some(op) = tokens.next() else { break };
        let Some(rhs_token) = tokens.next() else { break };
        let rhs = responses.get(rhs_token).cloned().unwrap_or_default();
        acc = match op {
            "AND" => combine(acc, rhs, |l, r| l && r),
            "OR" => combine(acc, rhs, |l, r| l || r),
            "XOR" => combine(acc, rhs, |l, r| l != r),
            _ => return FullTextResponse::default(),
        };
    }
    acc
}

/// Merges two keyword-clause responses by boolean membership, summing
/// scores for docs both sides score and unioning highlight fields —
/// mirroring `engine::executor`'s own set-combine-plus-highlight-merge
/// shape at a `Query` node, since from the real backend's point of view
/// `"a AND b"` is just another boolean combination of two clause hits.
fn combine(left: FullTextResponse, right: FullTextResponse, keep: impl Fn(bool, bool) -> bool) -> FullTextResponse {
    use std::collections::BTreeMap;

    let mut by_doc: BTreeMap<DocId, (f64, bool, bool, HashMap<String, String>)> = BTreeMap::new();
    for ((&doc, &score), fields) in left.doc_ids.iter().zip(left.scores.iter()).zip(left.highlights.iter()) {
        let entry = by_doc.entry(doc).or_insert((0.0, false, false, HashMap::new()));
        entry.0 += score;
        entry.1 = true;
        entry.3.extend(fields.clone());
    }
    for ((&doc, &score), fields) in right.doc_ids.iter().zip(right.scores.iter()).zip(right.highlights.iter()) {
        let entry = by_doc.entry(doc).or_insert((0.0, false, false, HashMap::new()));
        entry.0 += score;
        entry.2 = true;
        entry.3.extend(fields.clone());
    }

    let mut response = FullTextResponse::default();
    for (doc, (score, in_left, in_right, fields)) in by_doc {
        if keep(in_left, in_right) {
            response.doc_ids.push(doc);
            response.scores.push(score);
            response.highlights.push(fields);
        }
    }
    response
}

impl FullTextSession for StubSession {
    fn evaluate(
        &mut self,
        query: &str,
        doc_filter: Option<&RoaringBitmap>,
        _highlight: bool,
    ) -> Result<FullTextResponse, TransientBackendError> {
        if self.fail {
            return Err(TransientBackendError::Unavailable("stub configured to fail".into()));
        }
        let mut response = resolve(&self.responses, query);
        if let Some(filter) = doc_filter {
            let keep: Vec<usize> = response
                .doc_ids
                .iter()
                .enumerate()
                .filter(|(_, d)| filter.contains(**d))
                .map(|(i, _)| i)
                .collect();
            response.doc_ids = keep.iter().map(|&i| response.doc_ids[i]).collect();
            response.scores = keep.iter().map(|&i| response.scores[i]).collect();
            response.highlights = keep.iter().map(|&i| response.highlights[i].clone()).collect();
        }
        Ok(response)
    }

    fn recreate_index(&mut self) -> Result<(), IndexingError> {
        if self.fail {
            return Err(IndexingError::RecreateFailed("stub configured to fail".into()));
        }
        Ok(())
    }
}

impl FullTextTransport for StubFullTextTransport {
    fn connect(&self) -> Result<Box<dyn FullTextSession>, TransientBackendError> {
        if self.fail {
            return Err(TransientBackendError::Unavailable("stub configured to fail".into()));
        }
        Ok(Box::new(StubSession { responses: self.responses.clone(), fail: self.fail }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    fn response(doc_ids: &[DocId], score: f64) -> FullTextResponse {
        FullTextResponse {
            doc_ids: doc_ids.to_vec(),
            scores: vec![score; doc_ids.len()],
            highlights: doc_ids.iter().map(|_| HashMap::new()).collect(),
        }
    }

    #[test]
    fn evaluate_returns_stubbed_response() {
        let mut responses = HashMap::new();
        responses.insert("germany".to_string(), response(&[0], 1.5));
        let connector = FullTextConnector::new(Arc::new(StubFullTextTransport::new(responses)));

        let result = connector.evaluate("germany", None, true);
        assert_eq!(result.doc_ids, vec![0]);
    }

    #[test]
    fn transient_failure_degrades_to_empty_response() {
        let connector = FullTextConnector::new(Arc::new(StubFullTextTransport::failing()));
        let result = connector.evaluate("anything", None, true);
        assert_eq!(result, FullTextResponse::default());
    }

    #[test]
    fn recreate_index_propagates_failure() {
        let connector = FullTextConnector::new(Arc::new(StubFullTextTransport::failing()));
        assert!(connector.recreate_index().is_err());
    }

    #[test]
    fn doc_filter_restricts_results() {
        let mut responses = HashMap::new();
        responses.insert("germany".to_string(), response(&[0, 1, 2], 1.0));
        let connector = FullTextConnector::new(Arc::new(StubFullTextTransport::new(responses)));

        let filter: RoaringBitmap = [1u32].into_iter().collect();
        let result = connector.evaluate("germany", Some(&filter), false);
        assert_eq!(result.doc_ids, vec![1]);
    }

    #[test]
    fn resolves_fused_or_string_by_boolean_union() {
        let mut responses = HashMap::new();
        responses.insert("germany".to_string(), response(&[0], 1.0));
        let connector = FullTextConnector::new(Arc::new(StubFullTextTransport::new(responses)));

        // "avocado" has no entry; OR with it must still surface doc 0.
        let result = connector.evaluate("germany OR avocado", None, false);
        assert_eq!(result.doc_ids, vec![0]);
    }

    #[test]
    fn resolves_fused_and_string_by_boolean_intersection() {
        let mut responses = HashMap::new();
        responses.insert("germany".to_string(), response(&[0, 1], 1.0));
        responses.insert("weather".to_string(), response(&[0], 1.0));
        let connector = FullTextConnector::new(Arc::new(StubFullTextTransport::new(responses)));

        let result = connector.evaluate("germany AND weather", None, false);
        assert_eq!(result.doc_ids, vec![0]);
    }
}
