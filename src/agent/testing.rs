//! In-crate test doubles for providers, capabilities and specialists.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::finding::{AgentResponse, ClassificationResult, IntentLabel};
use super::message::{ChatRequest, ChatResponse};
use super::provider::LlmProvider;
use super::traits::Specialist;
use crate::capability::{IntentClassifier, Passage, Retriever, StructuredQuery};
use crate::error::AgentError;

/// Completion provider that replays a fixed script and records requests.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    failure: Option<String>,
    delay: Duration,
    delayed_call: Option<usize>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    /// Replies with each entry once, in order.
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            failure: None,
            delay: Duration::ZERO,
            delayed_call: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with an API error.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Sleeps before answering each call.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.delayed_call = None;
        self
    }

    /// Sleeps before answering only the `index`-th call (0-based).
    ///
    /// A call dropped while sleeping does not consume a scripted reply.
    pub const fn with_delay_on_call(mut self, index: usize, delay: Duration) -> Self {
        self.delay = delay;
        self.delayed_call = Some(index);
        self
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Requests received, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let index = {
            let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
            requests.push(request.clone());
            requests.len() - 1
        };
        if !self.delay.is_zero() && self.delayed_call.is_none_or(|delayed| delayed == index) {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(ref message) = self.failure {
            return Err(AgentError::ApiRequest {
                message: message.clone(),
                status: Some(503),
            });
        }
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        reply.map(ChatResponse::text).ok_or_else(|| AgentError::ApiRequest {
            message: "script exhausted".to_string(),
            status: None,
        })
    }
}

/// Classifier returning a fixed result.
pub struct FixedClassifier {
    result: Option<ClassificationResult>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedClassifier {
    /// Always answers `label` with `confidence`.
    pub fn new(label: &str, confidence: f32) -> Self {
        Self {
            result: Some(ClassificationResult::new(IntentLabel::parse(label), confidence)),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails.
    pub const fn failing() -> Self {
        Self {
            result: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleeps before answering.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn classify(&self, _text: &str) -> Result<ClassificationResult, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result
            .clone()
            .ok_or_else(|| AgentError::capability("classifier", "unreachable"))
    }
}

/// Retriever returning the same passages for every query.
pub struct StaticRetriever {
    passages: Vec<String>,
}

impl StaticRetriever {
    /// Creates a retriever over `passages`.
    pub fn new(passages: Vec<&str>) -> Self {
        Self {
            passages: passages.into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Passage>, AgentError> {
        Ok(self
            .passages
            .iter()
            .take(k)
            .enumerate()
            .map(|(idx, text)| Passage {
                text: text.clone(),
                source: format!("doc-{idx}"),
                score: 1.0,
            })
            .collect())
    }
}

/// Retriever that always fails.
pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, AgentError> {
        Err(AgentError::capability("retrieval", "index unavailable"))
    }
}

/// Structured-query provider with a fixed answer.
pub struct StaticStructuredQuery {
    answer: Result<String, String>,
}

impl StaticStructuredQuery {
    /// `Ok(rows)` answers every statement with `rows`; `Err(msg)` fails it.
    pub fn new(answer: Result<&str, &str>) -> Self {
        Self {
            answer: answer.map(str::to_string).map_err(str::to_string),
        }
    }
}

#[async_trait]
impl StructuredQuery for StaticStructuredQuery {
    async fn execute(&self, _statement: &str) -> Result<String, AgentError> {
        self.answer
            .clone()
            .map_err(|message| AgentError::capability("structured query", message))
    }

    async fn describe(&self, tables: &[String]) -> Result<String, AgentError> {
        Ok(format!("CREATE TABLE {}", tables.join(", ")))
    }
}

/// Specialist that returns a fixed response and records its sub-queries.
pub struct RecordingSpecialist {
    id: String,
    response: AgentResponse,
    delay: Duration,
    panics: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingSpecialist {
    /// Creates a specialist answering every sub-query with `response`.
    pub fn new(id: &str, response: AgentResponse) -> Self {
        Self {
            id: id.to_string(),
            response,
            delay: Duration::ZERO,
            panics: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps before answering.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panics instead of answering.
    pub const fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Sub-queries received, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Specialist for RecordingSpecialist {
    fn id(&self) -> &str {
        &self.id
    }

    #[allow(clippy::panic)]
    async fn answer(&self, sub_query: &str) -> AgentResponse {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sub_query.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("specialist {} crashed", self.id);
        }
        self.response.clone()
    }
}
