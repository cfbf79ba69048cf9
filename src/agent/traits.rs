//! Agent and specialist trait definitions.
//!
//! [`Agent`] describes a single-role completion caller (planner,
//! synthesizer, specialist reasoning round). [`Specialist`] is the one
//! capability the orchestrator needs from a registered domain specialist.

use async_trait::async_trait;

use super::finding::AgentResponse;
use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Text returned by one agent completion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

impl From<ChatResponse> for Completion {
    fn from(response: ChatResponse) -> Self {
        Self {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        }
    }
}

/// Trait implemented by every completion-backed role.
///
/// Agents encapsulate a specific role with a fixed system prompt and model
/// configuration; [`Agent::execute`] runs one completion against a provider.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        1024
    }

    /// Sequences at which the provider must stop generating.
    fn stop_sequences(&self) -> Vec<String> {
        Vec::new()
    }

    /// Builds the request for one user message.
    fn request(&self, user_msg: &str) -> ChatRequest {
        ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
            stop: self.stop_sequences(),
        }
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<Completion, AgentError> {
        let request = self.request(user_msg);
        let response = provider.chat(&request).await?;
        Ok(response.into())
    }
}

/// A registered domain specialist.
///
/// `answer` never fails: every internal problem is reported through
/// [`AgentResponse::status`].
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Registry identifier (e.g. `"ACADEMIC"`).
    fn id(&self) -> &str;

    /// Human-readable name.
    fn display_name(&self) -> &str {
        self.id()
    }

    /// Answers one sub-query.
    async fn answer(&self, sub_query: &str) -> AgentResponse;
}
