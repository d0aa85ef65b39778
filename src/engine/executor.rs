//! The bottom-up executor: walks the annotated parse tree leaf-up,
//! dispatching each leaf to the percentile index, column-name index, or
//! full-text backend, and combining results with the boolean algebra at
//! each internal node. An `Executor` is always constructed fresh per
//! query — its `scores`/`last_docs`/`last_cols` cursors are never shared
//! across concurrent calls.

use hashbrown::HashMap;
use roaring::RoaringBitmap;

use crate::column_index::ColumnNameIndex;
use crate::dsl::ast::{BoolOp, ColNode, ColumnTerm, DocNode, NameTerm, PercentileTerm, Side, Term};
use crate::error::EngineError;
use crate::fulltext::FullTextConnector;
use crate::ids::{DocId, IdMaps};
use crate::percentile::{FainderMode, PercentileIndex};

pub type DocHighlights = HashMap<DocId, HashMap<String, String>>;
pub type ColHighlights = RoaringBitmap;
pub type Highlights = (DocHighlights, ColHighlights);

/// Behavior flags threaded through a single `execute` call.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionFlags {
    pub fainder_mode: FainderMode,
    pub enable_highlighting: bool,
    pub enable_filtering: bool,
}

pub struct Executor<'a> {
    id_maps: &'a IdMaps,
    percentile: &'a PercentileIndex,
    columns: &'a ColumnNameIndex,
    fulltext: &'a FullTextConnector,
    flags: ExecutionFlags,
    /// Per-query accumulator driven by keyword term scores.
    pub scores: HashMap<DocId, f64>,
    /// The two independent left-to-right prefilter cursors.
    last_docs: Option<RoaringBitmap>,
    last_cols: Option<RoaringBitmap>,
}

impl<'a> Executor<'a> {
    pub fn new(
        id_maps: &'a IdMaps,
        percentile: &'a PercentileIndex,
        columns: &'a ColumnNameIndex,
        fulltext: &'a FullTextConnector,
        flags: ExecutionFlags,
    ) -> Self {
        Self {
            id_maps,
            percentile,
            columns,
            fulltext,
            flags,
            scores: HashMap::new(),
            last_docs: None,
            last_cols: None,
        }
    }

    /// Runs the whole tree and produces the final ranked doc list plus
    /// highlights (the facade's `execute` return value).
    pub fn run(mut self, tree: &DocNode) -> Result<(Vec<DocId>, Highlights), EngineError> {
        let (docs, highlights) = self.eval_doc(tree)?;
        let mut ranked: Vec<DocId> = docs.iter().collect();
        ranked.sort_by(|&a, &b| {
            let sa = self.scores.get(&a).copied().unwrap_or(-1.0);
            let sb = self.scores.get(&b).copied().unwrap_or(-1.0);
            sb.total_cmp(&sa).then(a.cmp(&b))
        });
        Ok((ranked, highlights))
    }

    fn eval_doc(&mut self, node: &DocNode) -> Result<(RoaringBitmap, Highlights), EngineError> {
        let result = match node {
            DocNode::Query(left, op, right) => {
                let (left_docs, left_hl) = self.eval_doc(left)?;
                self.last_docs = Some(left_docs.clone());
                let (right_docs, right_hl) = self.eval_doc(right)?;
                let docs = combine(*op, left_docs, right_docs);
                let hl = self.merge_highlights(left_hl, right_hl, &docs);
                (docs, hl)
            }
            DocNode::Expr(inner) => self.eval_doc(inner)?,
            DocNode::NotExpr(inner) => {
                let (inner_docs, _) = self.eval_doc(inner)?;
                let docs = self.id_maps.all_docs() - inner_docs;
                (docs, (HashMap::new(), RoaringBitmap::new()))
            }
            DocNode::Term(Term::Keyword(kw)) => self.eval_keyword(kw)?,
            DocNode::Term(Term::Column(col)) => {
                let cols = self.eval_col(col)?;
                let docs = self.id_maps.cols_to_docs(&cols);
                (docs, (HashMap::new(), cols))
            }
        };
        self.last_docs = Some(result.0.clone());
        Ok(result)
    }

    fn eval_col(&mut self, node: &ColNode) -> Result<RoaringBitmap, EngineError> {
        let result = match node {
            ColNode::ColumnQuery(left, op, right) => {
                let left_cols = self.eval_col(left)?;
                self.last_cols = Some(left_cols.clone());
                let right_cols = self.eval_col(right)?;
                combine(*op, left_cols, right_cols)
            }
            ColNode::ColExpr(inner) => self.eval_col(inner)?,
            ColNode::NotColExpr(inner) => {
                let inner_cols = self.eval_col(inner)?;
                self.id_maps.all_cols() - inner_cols
            }
            ColNode::ColumnTerm(ColumnTerm::Name(name)) => self.eval_name(name)?,
            ColNode::ColumnTerm(ColumnTerm::Percentile(pct)) => self.eval_percentile(pct)?,
        };
        self.last_cols = Some(result.clone());
        Ok(result)
    }

    fn is_and_right(side: &Option<(BoolOp, Side)>) -> bool {
        matches!(side, Some((BoolOp::And, Side::Right)))
    }

    fn eval_percentile(&mut self, term: &PercentileTerm) -> Result<RoaringBitmap, EngineError> {
        let hist_filter = if self.flags.enable_filtering && Self::is_and_right(&term.annotation) {
            self.last_cols.as_ref().map(|cols| self.id_maps.cols_to_hists(cols))
        } else {
            None
        };
        let hists = self.percentile.search(
            term.pctl,
            term.cmp,
            term.reference,
            self.flags.fainder_mode,
            hist_filter.as_ref(),
        )?;
        Ok(self.id_maps.hists_to_cols(&hists))
    }

    fn eval_name(&mut self, term: &NameTerm) -> Result<RoaringBitmap, EngineError> {
        let col_filter = if self.flags.enable_filtering && Self::is_and_right(&term.annotation) {
            self.last_cols.clone()
        } else {
            None
        };
        Ok(self.columns.search(&term.name, term.k, col_filter.as_ref())?)
    }

    fn eval_keyword(
        &mut self,
        kw: &crate::dsl::ast::KeywordTerm,
    ) -> Result<(RoaringBitmap, Highlights), EngineError> {
        let doc_filter = if self.flags.enable_filtering && Self::is_and_right(&kw.annotation) {
            self.last_docs.clone()
        } else {
            None
        };
        let response = self.fulltext.evaluate(&kw.lucene, doc_filter.as_ref(), self.flags.enable_highlighting);

        let mut doc_highlights = HashMap::new();
        let mut docs = RoaringBitmap::new();
        for ((&doc, &score), fields) in response
            .doc_ids
            .iter()
            .zip(response.scores.iter())
            .zip(response.highlights.iter())
        {
            docs.insert(doc);
            *self.scores.entry(doc).or_insert(0.0) += score;
            if !fields.is_empty() {
                doc_highlights.insert(doc, fields.clone());
            }
        }
        Ok((docs, (doc_highlights, RoaringBitmap::new())))
    }

    /// Boolean-node highlight merge: document snippets merge field-by-field,
    /// tokenized `<mark>` union; column highlights union then restrict to
    /// columns of surviving documents.
    fn merge_highlights(&self, left: Highlights, right: Highlights, docs: &RoaringBitmap) -> Highlights {
        let (left_docs, left_cols) = left;
        let (right_docs, right_cols) = right;

        let mut merged_docs = HashMap::new();
        for doc in docs.iter() {
            let left_fields = left_docs.get(&doc);
            let right_fields = right_docs.get(&doc);
            if left_fields.is_none() && right_fields.is_none() {
                continue;
            }
            let mut fields: HashMap<String, String> = HashMap::new();
            let mut keys: Vec<&String> = Vec::new();
            if let Some(f) = left_fields {
                keys.extend(f.keys());
            }
            if let Some(f) = right_fields {
                for k in f.keys() {
                    if !keys.contains(&k) {
                        keys.push(k);
                    }
                }
            }
            for key in keys {
                let left_text = left_fields.and_then(|f| f.get(key)).map(String::as_str).unwrap_or("");
                let right_text = right_fields.and_then(|f| f.get(key)).map(String::as_str).unwrap_or("");
                let merged = merge_snippet(left_text, right_text);
                fields.insert(key.clone(), merged);
            }
            merged_docs.insert(doc, fields);
        }

        let cols = (left_cols | right_cols) & self.id_maps.cols_in_docs(docs);
        (merged_docs, cols)
    }
}

fn combine(op: BoolOp, left: RoaringBitmap, right: RoaringBitmap) -> RoaringBitmap {
    match op {
        BoolOp::And => left & right,
        BoolOp::Or => left | right,
        BoolOp::Xor => left ^ right,
    }
}

/// Merges two highlight snippets for the same field. If one side is
/// empty, the other wins outright. Otherwise the left side is the base
/// and every `<mark>word</mark>` span from the right is folded in,
/// token-by-token, so a marked word never gets matched as a substring of
/// a longer word that merely contains it.
fn merge_snippet(left: &str, right: &str) -> String {
    if left.is_empty() {
        return right.to_string();
    }
    if right.is_empty() {
        return left.to_string();
    }

    let mut base = left.to_string();
    for word in marked_words(right) {
        let marked = format!("<mark>{word}</mark>");
        if base.contains(&marked) {
            continue;
        }
        base = mark_token(&base, &word, &marked);
    }
    base
}

fn marked_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("<mark>") {
        let after_open = &rest[start + "<mark>".len()..];
        let Some(end) = after_open.find("</mark>") else { break };
        words.push(after_open[..end].to_string());
        rest = &after_open[end + "</mark>".len()..];
    }
    words
}

/// Rewrites whole whitespace-delimited tokens equal to `word` with
/// `marked`; if no such token exists, appends `marked` as a new token.
fn mark_token(base: &str, word: &str, marked: &str) -> String {
    let mut found = false;
    let tokens: Vec<String> = base
        .split_whitespace()
        .map(|tok| {
            if tok == word {
                found = true;
                marked.to_string()
            } else {
                tok.to_string()
            }
        })
        .collect();
    let mut result = tokens.join(" ");
    if !found {
        result.push(' ');
        result.push_str(marked);
    }
    result
}
