//! The column-name k-NN index adapter. The production backend (HNSW over
//! column-name embeddings) lives behind a separate service; this module
//! defines the trait boundary plus a brute-force stand-in used as the
//! crate's own test fixture.

use crate::error::ColumnSearchError;
use crate::ids::ColId;
use roaring::RoaringBitmap;

/// The a-priori k-NN lookup a production HNSW service would provide: no
/// filter baked in, just "the k nearest columns to this name".
pub trait ColumnNameBackend: Send + Sync {
    fn nearest(&self, name: &str, k: u32) -> Result<RoaringBitmap, ColumnSearchError>;
}

/// Wraps a [`ColumnNameBackend`] and applies the `id_filter` as a
/// post-prune over whatever the backend's own k-NN lookup returns.
pub struct ColumnNameIndex {
    backend: Box<dyn ColumnNameBackend>,
}

impl ColumnNameIndex {
    pub fn new(backend: Box<dyn ColumnNameBackend>) -> Self {
        Self { backend }
    }

    /// `search(name, k, id_filter) -> ColId set`.
    pub fn search(
        &self,
        name: &str,
        k: u32,
        id_filter: Option<&RoaringBitmap>,
    ) -> Result<RoaringBitmap, ColumnSearchError> {
        if name.trim().is_empty() {
            return Err(ColumnSearchError::EmptyName);
        }
        let mut result = self.backend.nearest(name, k)?;
        if let Some(filter) = id_filter {
            result &= filter;
        }
        Ok(result)
    }
}

/// A column name plus the embedding used for brute-force cosine-distance
/// nearest-neighbor lookup (the test/demo stand-in backend).
#[derive(Debug, Clone)]
pub struct NamedColumn {
    pub col: ColId,
    pub name: String,
    pub embedding: Vec<f64>,
}

/// Brute-force cosine-similarity k-NN, explicitly a stand-in for a
/// production HNSW service — sufficient for correctness testing at the
/// small fixture scale this crate's own tests run at.
#[derive(Debug, Default)]
pub struct BruteForceColumnIndex {
    columns: Vec<NamedColumn>,
}

impl BruteForceColumnIndex {
    pub fn new(columns: Vec<NamedColumn>) -> Self {
        Self { columns }
    }

    fn embedding_for(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.embedding.as_slice())
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl ColumnNameBackend for BruteForceColumnIndex {
    fn nearest(&self, name: &str, k: u32) -> Result<RoaringBitmap, ColumnSearchError> {
        // Exact name match short-circuits to every column sharing that
        // name, falling back to embedding similarity only when the query
        // name itself isn't a known column.
        let exact: Vec<ColId> = self
            .columns
            .iter()
            .filter(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.col)
            .collect();

        let query_embedding = match self.embedding_for(name) {
            Some(e) => e.to_vec(),
            None => return Ok(exact.into_iter().collect()),
        };

        let mut scored: Vec<(f64, ColId)> = self
            .columns
            .iter()
            .map(|c| (cosine_similarity(&query_embedding, &c.embedding), c.col))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().take(k.max(1) as usize).map(|(_, c)| c).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> ColumnNameIndex {
        let columns = vec![
            NamedColumn { col: 0, name: "Latitude".into(), embedding: vec![1.0, 0.0] },
            NamedColumn { col: 1, name: "Longitude".into(), embedding: vec![0.9, 0.1] },
            NamedColumn { col: 2, name: "avocado_price".into(), embedding: vec![0.0, 1.0] },
        ];
        ColumnNameIndex::new(Box::new(BruteForceColumnIndex::new(columns)))
    }

    #[test]
    fn rejects_empty_name() {
        let idx = fixture();
        assert!(matches!(
            idx.search("", 1, None).unwrap_err(),
            ColumnSearchError::EmptyName
        ));
    }

    #[test]
    fn exact_name_match_resolves_to_its_own_column() {
        let idx = fixture();
        let result = idx.search("Latitude", 1, None).unwrap();
        assert!(result.contains(0));
    }

    #[test]
    fn filter_is_applied_as_post_prune() {
        let idx = fixture();
        let filter: RoaringBitmap = [2u32].into_iter().collect();
        let result = idx.search("Latitude", 3, Some(&filter)).unwrap();
        assert_eq!(result, RoaringBitmap::new(), "Latitude's nearest neighbors exclude column 2");
    }
}
