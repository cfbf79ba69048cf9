//! Synthesizer agent for merging specialist responses.
//!
//! Takes the ordered specialist outputs of one request and produces the
//! final user-facing answer. The completion is returned unmodified.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::finding::SpecialistOutput;
use super::prompt::build_synthesizer_prompt;
use super::provider::{LlmProvider, with_timeout};
use super::traits::Agent;
use crate::error::AgentError;

/// Agent that writes the final answer from specialist outputs.
pub struct SynthesizerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    timeout: Duration,
}

impl SynthesizerAgent {
    /// Creates a new synthesizer agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.synthesizer_model.clone(),
            max_tokens: config.synthesizer_max_tokens,
            system_prompt,
            timeout: config.timeout,
        }
    }

    /// Merges `outputs` (in plan order) into one answer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on provider failure or timeout.
    pub async fn synthesize(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        outputs: &[SpecialistOutput],
    ) -> Result<String, AgentError> {
        let user_msg = build_synthesizer_prompt(query, outputs);
        let completion = with_timeout(
            "synthesizer completion",
            self.timeout,
            self.execute(provider, &user_msg),
        )
        .await?;
        debug!(
            inputs = outputs.len(),
            chars = completion.content.len(),
            "synthesis complete"
        );
        Ok(completion.content)
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
