//! Static id-space maps and the scope-conversion helpers the executor uses
//! at column-scope boundaries.

use hashbrown::HashMap;
use roaring::RoaringBitmap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type DocId = u32;
pub type ColId = u32;
pub type HistId = u32;

/// The four static many-to-many/one-to-one maps. Loaded once, immutable
/// until an atomic swap by [`crate::engine::QueryEngine::update_indices`].
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdMaps {
    doc_to_cols: HashMap<DocId, RoaringBitmap>,
    col_to_doc: HashMap<ColId, DocId>,
    col_to_hist: HashMap<ColId, HistId>,
    hist_to_col: HashMap<HistId, ColId>,
}

impl IdMaps {
    pub fn builder() -> IdMapsBuilder {
        IdMapsBuilder::default()
    }

    /// All known document ids. Used by `Not` in document scope.
    pub fn all_docs(&self) -> RoaringBitmap {
        self.doc_to_cols.keys().copied().collect()
    }

    /// All known column ids. Used by `Not` in column scope.
    pub fn all_cols(&self) -> RoaringBitmap {
        self.col_to_doc.keys().copied().collect()
    }

    pub fn doc_to_cols(&self, doc: DocId) -> RoaringBitmap {
        self.doc_to_cols.get(&doc).cloned().unwrap_or_default()
    }

    /// `doc_to_cols` extended over a whole DocId set.
    pub fn cols_in_docs(&self, docs: &RoaringBitmap) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        for doc in docs {
            out |= self.doc_to_cols(doc);
        }
        out
    }

    /// `col_to_doc` extended over a whole ColId set: the conversion back
    /// to document scope at a column-scope boundary.
    pub fn cols_to_docs(&self, cols: &RoaringBitmap) -> RoaringBitmap {
        cols.iter()
            .filter_map(|c| self.col_to_doc.get(&c).copied())
            .collect()
    }

    /// `col_to_hist`, partial: only numeric columns convert.
    pub fn cols_to_hists(&self, cols: &RoaringBitmap) -> RoaringBitmap {
        cols.iter()
            .filter_map(|c| self.col_to_hist.get(&c).copied())
            .collect()
    }

    /// `hist_to_col`, total.
    pub fn hists_to_cols(&self, hists: &RoaringBitmap) -> RoaringBitmap {
        hists
            .iter()
            .filter_map(|h| self.hist_to_col.get(&h).copied())
            .collect()
    }

    pub fn col_owner(&self, col: ColId) -> Option<DocId> {
        self.col_to_doc.get(&col).copied()
    }

    pub fn num_docs(&self) -> usize {
        self.doc_to_cols.len()
    }

    pub fn num_cols(&self) -> usize {
        self.col_to_doc.len()
    }

    /// Serializes to the persisted `metadata` JSON document. The
    /// zstd-compressed percentile-index artifacts and the HNSW binary are
    /// stored separately; this is the only (de)serialization entry point
    /// `IdMaps` owns.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Default)]
pub struct IdMapsBuilder {
    doc_to_cols: HashMap<DocId, RoaringBitmap>,
    col_to_doc: HashMap<ColId, DocId>,
    col_to_hist: HashMap<ColId, HistId>,
    hist_to_col: HashMap<HistId, ColId>,
}

impl IdMapsBuilder {
    pub fn add_column(mut self, doc: DocId, col: ColId) -> Self {
        self.doc_to_cols.entry(doc).or_default().insert(col);
        self.col_to_doc.insert(col, doc);
        self
    }

    pub fn add_numeric_column(mut self, doc: DocId, col: ColId, hist: HistId) -> Self {
        self.doc_to_cols.entry(doc).or_default().insert(col);
        self.col_to_doc.insert(col, doc);
        self.col_to_hist.insert(col, hist);
        self.hist_to_col.insert(hist, col);
        self
    }

    pub fn build(self) -> IdMaps {
        IdMaps {
            doc_to_cols: self.doc_to_cols,
            col_to_doc: self.col_to_doc,
            col_to_hist: self.col_to_hist,
            hist_to_col: self.hist_to_col,
        }
    }
}
