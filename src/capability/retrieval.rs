//! In-memory BM25 retrieval over a JSON Lines corpus.
//!
//! Each corpus line is one [`Document`]. Documents may carry a domain tag;
//! a [`CorpusRetriever`] scoped to a set of domains only sees documents
//! with one of those tags plus untagged documents.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::{Passage, Retriever};
use crate::error::AgentError;

/// BM25 term-frequency saturation.
const BM25_K1: f64 = 1.2;
/// BM25 length normalization.
const BM25_B: f64 = 0.75;

/// One corpus entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Passage text.
    pub text: String,
    /// Source identifier (file name, URL, section id).
    pub source: String,
    /// Optional domain tag (e.g. `"ACADEMIC"`).
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug)]
struct IndexedDocument {
    document: Document,
    term_freqs: HashMap<String, u32>,
    length: usize,
}

/// Immutable BM25 index, built once and shared by every retriever.
#[derive(Debug, Default)]
pub struct CorpusIndex {
    documents: Vec<IndexedDocument>,
    doc_freqs: HashMap<String, usize>,
    avg_length: f64,
}

fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

impl CorpusIndex {
    /// Builds an index over the given documents.
    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0usize;

        let documents: Vec<IndexedDocument> = documents
            .into_iter()
            .map(|document| {
                let tokens = tokenize(&document.text);
                let mut term_freqs: HashMap<String, u32> = HashMap::new();
                for token in &tokens {
                    *term_freqs.entry(token.clone()).or_default() += 1;
                }
                for term in term_freqs.keys() {
                    *doc_freqs.entry(term.clone()).or_default() += 1;
                }
                total_length += tokens.len();
                IndexedDocument {
                    document,
                    term_freqs,
                    length: tokens.len(),
                }
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let avg_length = if documents.is_empty() {
            0.0
        } else {
            total_length as f64 / documents.len() as f64
        };

        Self {
            documents,
            doc_freqs,
            avg_length,
        }
    }

    /// Loads a JSON Lines corpus. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Capability`] if the file cannot be read or a
    /// line is not a valid document.
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::capability("corpus", format!("cannot read {}: {e}", path.display()))
        })?;

        let mut documents = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let document: Document = serde_json::from_str(line).map_err(|e| {
                AgentError::capability(
                    "corpus",
                    format!("{}:{}: invalid document: {e}", path.display(), idx + 1),
                )
            })?;
            documents.push(document);
        }

        debug!(path = %path.display(), documents = documents.len(), "corpus loaded");
        Ok(Self::from_documents(documents))
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if no documents are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Scores every visible document against `query` and returns the best
    /// `k` with a positive score.
    ///
    /// An empty `domains` slice makes every document visible.
    #[must_use]
    pub fn search(&self, query: &str, k: usize, domains: &[String]) -> Vec<Passage> {
        let terms = tokenize(query);
        if terms.is_empty() || k == 0 {
            return Vec::new();
        }

        #[allow(clippy::cast_precision_loss)]
        let n = self.documents.len() as f64;

        let mut scored: Vec<(f64, &IndexedDocument)> = self
            .documents
            .iter()
            .filter(|d| visible(&d.document, domains))
            .filter_map(|d| {
                let score = self.score(d, &terms, n);
                (score > 0.0).then_some((score, d))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, d)| Passage {
                text: d.document.text.clone(),
                source: d.document.source.clone(),
                score,
            })
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, doc: &IndexedDocument, terms: &[String], n: f64) -> f64 {
        let length_norm = if self.avg_length > 0.0 {
            doc.length as f64 / self.avg_length
        } else {
            1.0
        };

        terms
            .iter()
            .filter_map(|term| {
                let tf = f64::from(*doc.term_freqs.get(term)?);
                let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5)).ln_1p();
                Some(
                    idf * (tf * (BM25_K1 + 1.0))
                        / BM25_K1.mul_add(1.0 - BM25_B + BM25_B * length_norm, tf),
                )
            })
            .sum()
    }
}

fn visible(document: &Document, domains: &[String]) -> bool {
    if domains.is_empty() {
        return true;
    }
    document
        .domain
        .as_deref()
        .is_none_or(|tag| domains.iter().any(|d| d.eq_ignore_ascii_case(tag)))
}

/// Retrieval handle onto a shared [`CorpusIndex`], scoped to domains.
#[derive(Debug, Clone)]
pub struct CorpusRetriever {
    index: Arc<CorpusIndex>,
    domains: Vec<String>,
}

impl CorpusRetriever {
    /// Creates a retriever limited to `domains` (empty = whole corpus).
    #[must_use]
    pub const fn new(index: Arc<CorpusIndex>, domains: Vec<String>) -> Self {
        Self { index, domains }
    }

    /// Domain tags this retriever is scoped to.
    #[must_use]
    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, AgentError> {
        Ok(self.index.search(query, k, &self.domains))
    }
}
