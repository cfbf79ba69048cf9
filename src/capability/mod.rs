//! Capability providers consumed by the routing pipeline.
//!
//! The pipeline only sees the traits defined here; concrete providers
//! (HTTP classifier, BM25 corpus, `SQLite`) are built once at startup and
//! shared read-only behind `Arc`.

pub mod classifier;
pub mod retrieval;
pub mod sql;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::finding::ClassificationResult;
use crate::error::AgentError;

pub use classifier::{HttpClassifier, LlmClassifier};
pub use retrieval::{CorpusIndex, CorpusRetriever, Document};
pub use sql::SqliteQuery;

/// Short-text intent classifier.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Classifies one query.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the classifier is unreachable or its
    /// answer is malformed.
    async fn classify(&self, text: &str) -> Result<ClassificationResult, AgentError>;
}

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    pub text: String,
    /// Identifier of the source document.
    pub source: String,
    /// Retrieval score (higher is better).
    pub score: f64,
}

/// Passage retrieval over a document collection.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most `k` passages, best first.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the backing store fails.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, AgentError>;
}

/// Read-only structured-query access.
#[async_trait]
pub trait StructuredQuery: Send + Sync {
    /// Executes one statement and renders its rows as a tuple-list literal.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the statement is rejected or fails.
    async fn execute(&self, statement: &str) -> Result<String, AgentError>;

    /// Describes the given tables, or every table when `tables` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if a table does not exist.
    async fn describe(&self, tables: &[String]) -> Result<String, AgentError>;
}
