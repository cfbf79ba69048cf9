//! Intent classifiers.
//!
//! [`HttpClassifier`] calls a served short-text classification model.
//! [`LlmClassifier`] asks a completion provider for the same JSON answer
//! and is used when no classifier endpoint is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::IntentClassifier;
use crate::agent::finding::{ClassificationResult, IntentLabel};
use crate::agent::message::{ChatRequest, system_message, user_message};
use crate::agent::planner::extract_json_object;
use crate::agent::provider::{LlmProvider, with_timeout};
use crate::error::AgentError;

const PROVIDER: &str = "classifier";

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

/// Classifier answer on the wire.
#[derive(Debug, Deserialize)]
struct WireClassification {
    label: String,
    confidence: f32,
}

impl WireClassification {
    /// Confidence is a percentage on the wire; out-of-range values are clamped.
    fn into_result(self) -> ClassificationResult {
        ClassificationResult::new(IntentLabel::parse(&self.label), self.confidence)
    }
}

/// Classifier served over HTTP.
///
/// Sends `POST {"text": ...}` and expects `{"label": ..., "confidence": ...}`.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    /// Creates a classifier client for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Capability`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::capability(PROVIDER, e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IntentClassifier for HttpClassifier {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult, AgentError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { text })
            .send()
            .await
            .map_err(|e| AgentError::capability(PROVIDER, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::capability(
                PROVIDER,
                format!("classifier returned HTTP {status}"),
            ));
        }

        let wire: WireClassification = response
            .json()
            .await
            .map_err(|e| AgentError::capability(PROVIDER, format!("invalid answer: {e}")))?;
        Ok(wire.into_result())
    }
}

/// Classifier backed by a completion provider.
pub struct LlmClassifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

impl LlmClassifier {
    /// Creates a completion-backed classifier.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    fn parse(content: &str) -> Result<ClassificationResult, AgentError> {
        let json = extract_json_object(content).ok_or_else(|| AgentError::ResponseParse {
            message: "no JSON object in classifier output".to_string(),
            content: content.to_string(),
        })?;
        let wire: WireClassification =
            serde_json::from_str(json).map_err(|e| AgentError::ResponseParse {
                message: e.to_string(),
                content: content.to_string(),
            })?;
        Ok(wire.into_result())
    }
}

impl std::fmt::Debug for LlmClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClassifier")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult, AgentError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![system_message(&self.system_prompt), user_message(text)],
            temperature: Some(0.0),
            max_tokens: Some(64),
            json_mode: true,
            stop: Vec::new(),
        };
        let response = with_timeout("classifier completion", self.timeout, async {
            self.provider.chat(&request).await
        })
        .await?;
        debug!(chars = response.content.len(), "classifier completion received");
        Self::parse(&response.content)
    }
}
