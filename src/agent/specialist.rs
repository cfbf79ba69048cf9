//! Tool-using domain specialist.
//!
//! A [`ToolAgent`] runs the bounded reasoning loop for one sub-query and
//! turns however that loop ended into an [`AgentResponse`]. Errors and
//! panics never leave [`Specialist::answer`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, warn};

use super::agentic_loop::{LoopEnd, LoopSettings, ReactParser, agentic_loop};
use super::config::AgentConfig;
use super::executor::ToolExecutor;
use super::finding::AgentResponse;
use super::prompt::build_specialist_prompt;
use super::provider::LlmProvider;
use super::recovery::recover_output;
use super::registry::SpecialistProfile;
use super::tool::ToolSet;
use super::traits::Specialist;
use crate::error::AgentError;

/// Answer when the round budget ran out with nothing useful observed.
pub const NOT_FOUND_REPLY: &str = "No information was found for this question.";
/// An aborted loop's last observation is returned only above this length.
const BEST_EFFORT_MIN_CHARS: usize = 50;

/// Specialist backed by a completion provider and domain-scoped tools.
pub struct ToolAgent {
    profile: SpecialistProfile,
    provider: Arc<dyn LlmProvider>,
    parser: ReactParser,
    tools: ToolSet,
    executor: ToolExecutor,
    system_prompt: String,
    settings: LoopSettings,
}

impl ToolAgent {
    /// Creates a specialist.
    ///
    /// The structured-query tools are offered only when the profile allows
    /// them and the executor has a structured-query provider.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if the action parser cannot be
    /// built.
    pub fn new(
        profile: SpecialistProfile,
        provider: Arc<dyn LlmProvider>,
        executor: ToolExecutor,
        config: &AgentConfig,
        system_prompt: String,
    ) -> Result<Self, AgentError> {
        let tools =
            ToolSet::for_specialist(profile.structured_query && executor.has_structured_query());
        Ok(Self {
            profile,
            provider,
            parser: ReactParser::new()?,
            tools,
            executor,
            system_prompt,
            settings: LoopSettings {
                model: config.specialist_model.clone(),
                max_tokens: config.specialist_max_tokens,
                timeout: config.timeout,
                max_iterations: config.max_iterations,
            },
        })
    }

    /// The specialist's profile.
    #[must_use]
    pub const fn profile(&self) -> &SpecialistProfile {
        &self.profile
    }

    /// The tools this specialist may call.
    #[must_use]
    pub const fn tools(&self) -> &ToolSet {
        &self.tools
    }

    async fn run(&self, question: &str) -> Result<AgentResponse, AgentError> {
        let outcome = agentic_loop(
            self.provider.as_ref(),
            &self.system_prompt,
            &self.settings,
            &self.parser,
            &self.tools,
            &self.executor,
            |scratchpad| build_specialist_prompt(&self.profile, &self.tools, question, scratchpad),
        )
        .await?;

        let response = match outcome.end {
            LoopEnd::Final(answer) => AgentResponse::ok(answer, outcome.evidence),
            LoopEnd::Direct(result) if result.is_error => {
                AgentResponse::error(result.content, Vec::new())
            }
            LoopEnd::Direct(result) => AgentResponse::ok(result.content, outcome.evidence),
            LoopEnd::Unparsable(message) => recover_output(&message).into_response(outcome.evidence),
            LoopEnd::Aborted { last_observation } => match last_observation {
                Some(observation) if observation.chars().count() > BEST_EFFORT_MIN_CHARS => {
                    AgentResponse::ok(observation, outcome.evidence)
                }
                _ => AgentResponse::error(NOT_FOUND_REPLY, Vec::new()),
            },
        };
        debug!(
            agent = %self.profile.id,
            rounds = outcome.rounds,
            status = %response.status,
            "specialist finished"
        );
        Ok(response)
    }
}

/// Trims a sub-query and removes backticks.
#[must_use]
pub fn clean_sub_query(raw: &str) -> String {
    raw.trim().replace('`', "")
}

#[async_trait]
impl Specialist for ToolAgent {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn display_name(&self) -> &str {
        &self.profile.name
    }

    async fn answer(&self, sub_query: &str) -> AgentResponse {
        let question = clean_sub_query(sub_query);
        match AssertUnwindSafe(self.run(&question)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(agent = %self.profile.id, error = %e, "specialist failed");
                AgentResponse::error(format!("Agent error: {e}"), Vec::new())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(agent = %self.profile.id, panic = %message, "specialist panicked");
                AgentResponse::error(format!("Agent error: {message}"), Vec::new())
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "specialist panicked".to_string())
}

impl std::fmt::Debug for ToolAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAgent")
            .field("id", &self.profile.id)
            .field("tools", &self.tools.names())
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::finding::ResponseStatus;
    use crate::agent::registry::default_profiles;
    use crate::agent::testing::{
        FailingRetriever, ScriptedProvider, StaticRetriever, StaticStructuredQuery,
    };
    use crate::capability::{Retriever, StructuredQuery};
    use std::time::Duration;

    const LONG_PASSAGE: &str =
        "Tuition for the 2025 intake is paid in two installments, the first before week four.";

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .max_iterations(2)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn agent_with(
        replies: Vec<&str>,
        retriever: Arc<dyn Retriever>,
        sql: Option<Arc<dyn StructuredQuery>>,
    ) -> (ToolAgent, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(replies));
        let executor = ToolExecutor::new(retriever, sql, 3, Duration::from_secs(5));
        let agent = ToolAgent::new(
            default_profiles().remove(1),
            provider.clone(),
            executor,
            &config(),
            "specialist".to_string(),
        )
        .unwrap_or_else(|_| unreachable!());
        (agent, provider)
    }

    fn agent(replies: Vec<&str>, passages: Vec<&str>) -> (ToolAgent, Arc<ScriptedProvider>) {
        agent_with(replies, Arc::new(StaticRetriever::new(passages)), None)
    }

    #[test]
    fn test_clean_sub_query() {
        assert_eq!(clean_sub_query("  `tuition` fees \n"), "tuition fees");
    }

    #[test]
    fn test_tools_follow_structured_query_availability() {
        let (agent, _) = agent(vec![], vec![]);
        assert_eq!(agent.tools().len(), 1);
        assert_eq!(agent.id(), "FINANCIAL");
        assert_eq!(agent.display_name(), "Finance Office");

        let sql: Arc<dyn StructuredQuery> = Arc::new(StaticStructuredQuery::new(Ok("[]")));
        let (agent, _) = agent_with(vec![], Arc::new(StaticRetriever::new(vec![])), Some(sql));
        assert_eq!(agent.tools().len(), 3);
    }

    #[tokio::test]
    async fn test_final_answer_carries_evidence() {
        let (agent, _) = agent(
            vec![
                "I should search.\nAction: search_documents\nAction Input: tuition",
                "I know it now.\nFinal Answer: Two installments.",
            ],
            vec![LONG_PASSAGE],
        );
        let response = agent.answer("`tuition`").await;
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.text, "Two installments.");
        assert_eq!(response.evidence, vec![LONG_PASSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_structured_query_returns_rows_directly() {
        let sql: Arc<dyn StructuredQuery> =
            Arc::new(StaticStructuredQuery::new(Ok("[('522001', 'A', 3.2)]")));
        let (agent, provider) = agent_with(
            vec!["Action: sql_db_query\nAction Input: SELECT * FROM students LIMIT 1"],
            Arc::new(StaticRetriever::new(vec![])),
            Some(sql),
        );
        let response = agent.answer("student 522001").await;
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.text, "[('522001', 'A', 3.2)]");
        assert_eq!(response.evidence, vec!["[('522001', 'A', 3.2)]".to_string()]);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_structured_query_error_is_error_status() {
        let sql: Arc<dyn StructuredQuery> =
            Arc::new(StaticStructuredQuery::new(Err("no such column: gpa")));
        let (agent, _) = agent_with(
            vec!["Action: sql_db_query\nAction Input: SELECT gpa FROM students"],
            Arc::new(StaticRetriever::new(vec![])),
            Some(sql),
        );
        let response = agent.answer("gpa").await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.text.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_unparsable_output_is_recovered() {
        let (agent, _) = agent(vec!["The office is in building A."], vec![]);
        let response = agent.answer("where?").await;
        assert_eq!(response.status, ResponseStatus::ParseRecovered);
        assert_eq!(response.text, "The office is in building A.");
    }

    #[tokio::test]
    async fn test_provider_timeout_is_error_status() {
        let config = AgentConfig::builder()
            .api_key("test")
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = Arc::new(
            ScriptedProvider::new(vec!["Final Answer: too late"])
                .with_delay(Duration::from_millis(500)),
        );
        let executor = ToolExecutor::new(
            Arc::new(StaticRetriever::new(vec![])),
            None,
            3,
            Duration::from_secs(5),
        );
        let agent = ToolAgent::new(
            default_profiles().remove(1),
            provider,
            executor,
            &config,
            "specialist".to_string(),
        )
        .unwrap_or_else(|_| unreachable!());
        let response = agent.answer("tuition").await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.text.starts_with("Agent error: specialist completion timed out"));
        assert!(response.evidence.is_empty());
    }

    #[tokio::test]
    async fn test_aborted_returns_long_observation() {
        let search = "Action: search_documents\nAction Input: tuition";
        let (agent, provider) = agent(vec![search, search, search], vec![LONG_PASSAGE]);
        let response = agent.answer("tuition").await;
        assert_eq!(provider.call_count(), 2);
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.text, LONG_PASSAGE);
    }

    #[tokio::test]
    async fn test_aborted_short_observation_is_not_found() {
        let search = "Action: search_documents\nAction Input: tuition";
        let (agent, provider) = agent(vec![search, search], vec!["short"]);
        let response = agent.answer("tuition").await;
        assert_eq!(provider.call_count(), 2);
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.text, NOT_FOUND_REPLY);
        assert!(response.evidence.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_isolated() {
        let provider = Arc::new(ScriptedProvider::failing("rate limited"));
        let executor = ToolExecutor::new(
            Arc::new(StaticRetriever::new(vec![])),
            None,
            3,
            Duration::from_secs(5),
        );
        let agent = ToolAgent::new(
            default_profiles().remove(0),
            provider,
            executor,
            &config(),
            "specialist".to_string(),
        )
        .unwrap_or_else(|_| unreachable!());
        let response = agent.answer("gpa").await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.text.starts_with("Agent error: "));
        assert!(response.text.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_isolated() {
        let (agent, _) = agent_with(
            vec!["Action: search_documents\nAction Input: dorm"],
            Arc::new(FailingRetriever),
            None,
        );
        let response = agent.answer("dorm").await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.text.contains("index unavailable"));
        assert!(response.evidence.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "specialist panicked");
    }
}
