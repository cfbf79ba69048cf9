//! Orchestrator for the routing pipeline.
//!
//! Coordinates one request end to end: intent gate → planner (with the
//! single-step fallback) → concurrent specialist fan-out → plan-order
//! fan-in → synthesizer. Every failure below this boundary is turned into
//! a fixed user-facing string; only cancellation is reported as an error.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::create_provider;
use super::config::AgentConfig;
use super::executor::ToolExecutor;
use super::finding::{
    AgentResponse, PlanStep, Query, QueryResult, RouteTrace, RoutingPlan, SpecialistOutput,
    StepTrace,
};
use super::gate::{GateDecision, IntentGate};
use super::planner::PlannerAgent;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::registry::{SpecialistProfile, SpecialistRegistry, default_profiles, load_profiles};
use super::specialist::{ToolAgent, panic_message};
use super::synthesizer::SynthesizerAgent;
use crate::capability::{
    CorpusIndex, CorpusRetriever, HttpClassifier, IntentClassifier, LlmClassifier, SqliteQuery,
    StructuredQuery,
};
use crate::error::AgentError;

/// Answer when no specialist produced a response.
pub const NO_MATCH_REPLY: &str = "Sorry, I couldn't find any matching information.";
/// Answer when the final stage fails.
pub const APOLOGY_REPLY: &str =
    "Sorry, the system ran into a problem while looking that up. Please try again later.";

/// Orchestrates the routing pipeline.
///
/// Holds only read-only handles, so one orchestrator serves any number of
/// concurrent requests.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    gate: IntentGate,
    planner: PlannerAgent,
    synthesizer: SynthesizerAgent,
    registry: Arc<SpecialistRegistry>,
    max_concurrency: usize,
}

impl Orchestrator {
    /// Creates an orchestrator over an existing registry.
    ///
    /// `provider` backs the planner and the synthesizer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if the registry lacks the
    /// default specialist.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        classifier: Arc<dyn IntentClassifier>,
        registry: SpecialistRegistry,
        config: &AgentConfig,
        prompts: &PromptSet,
    ) -> Result<Self, AgentError> {
        registry.validate()?;
        Ok(Self {
            provider,
            gate: IntentGate::new(classifier, config.gate_threshold, config.timeout),
            planner: PlannerAgent::new(config, prompts.planner.clone()),
            synthesizer: SynthesizerAgent::new(config, prompts.synthesizer.clone()),
            registry: Arc::new(registry),
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    /// Builds every provider and specialist described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if a provider cannot be created, the corpus,
    /// database or specialists file cannot be loaded, or the registry is
    /// invalid.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(config)?);

        let classifier: Arc<dyn IntentClassifier> = match config.classifier_url {
            Some(ref url) => Arc::new(HttpClassifier::new(url.clone(), config.timeout)?),
            None => Arc::new(LlmClassifier::new(
                Arc::clone(&provider),
                config.classifier_model.clone(),
                prompts.classifier.clone(),
                config.timeout,
            )),
        };

        let registry = build_registry(config, &provider, &prompts)?;
        info!(
            provider = provider.name(),
            classifier = classifier.name(),
            specialists = registry.len(),
            "pipeline ready"
        );
        Self::new(provider, classifier, registry, config, &prompts)
    }

    /// The specialist registry.
    #[must_use]
    pub fn registry(&self) -> &SpecialistRegistry {
        &self.registry
    }

    /// Answers one query.
    ///
    /// Never fails: every problem becomes a natural-language answer.
    pub async fn run(&self, query: &str) -> QueryResult {
        let start = Instant::now();
        match self.run_cancellable(query, &CancellationToken::new()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "request failed");
                finish(APOLOGY_REPLY, Vec::new(), RouteTrace::default(), start)
            }
        }
    }

    /// Answers one query, stopping early when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when the token fires first; all
    /// in-flight specialist tasks of this request are aborted.
    pub async fn run_cancellable(
        &self,
        raw_query: &str,
        token: &CancellationToken,
    ) -> Result<QueryResult, AgentError> {
        let start = Instant::now();
        let mut trace = RouteTrace::default();

        let Some(query) = Query::accept(raw_query) else {
            debug!(bytes = raw_query.len(), "query rejected");
            return Ok(finish(NO_MATCH_REPLY, Vec::new(), trace, start));
        };

        match cancellable(token, self.gate.evaluate(query.as_str())).await? {
            GateDecision::ShortCircuit {
                reply,
                classification,
            } => {
                trace.classification = Some(classification);
                trace.short_circuited = true;
                return Ok(finish(reply, Vec::new(), trace, start));
            }
            GateDecision::Proceed { classification } => trace.classification = classification,
        }

        let (plan, used_fallback) = cancellable(token, self.resolve_plan(&query)).await?;
        trace.used_fallback_plan = used_fallback;

        let responses = self.fan_out(&plan, token).await?;

        let mut evidence = Vec::new();
        let mut outputs = Vec::new();
        for (step, response) in plan.steps.iter().zip(responses) {
            let Some((agent, response)) = response else {
                trace.steps.push(StepTrace {
                    agent: step.agent.clone(),
                    sub_query: step.query.clone(),
                    status: None,
                });
                continue;
            };
            trace.steps.push(StepTrace {
                agent: step.agent.clone(),
                sub_query: step.query.clone(),
                status: Some(response.status),
            });
            evidence.extend(response.evidence);
            outputs.push(SpecialistOutput {
                agent,
                text: response.text,
            });
        }

        if outputs.is_empty() {
            debug!("no specialist responded");
            return Ok(finish(NO_MATCH_REPLY, evidence, trace, start));
        }

        trace.synthesized = true;
        let synthesis = self
            .synthesizer
            .synthesize(self.provider.as_ref(), query.as_str(), &outputs);
        let answer = match cancellable(token, synthesis).await? {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "synthesizer failed");
                APOLOGY_REPLY.to_string()
            }
        };

        Ok(finish(&answer, evidence, trace, start))
    }

    /// Returns the plan a query would run with, and whether it is the
    /// fallback plan.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for blank or oversized queries.
    pub async fn plan_only(&self, raw_query: &str) -> Result<(RoutingPlan, bool), AgentError> {
        let query = Query::accept(raw_query).ok_or_else(|| AgentError::Orchestration {
            message: "query is empty or too long".to_string(),
        })?;
        Ok(self.resolve_plan(&query).await)
    }

    async fn resolve_plan(&self, query: &Query) -> (RoutingPlan, bool) {
        let outcome = self
            .planner
            .plan(self.provider.as_ref(), query.as_str(), self.registry.profiles())
            .await;
        let (plan, used_fallback) = outcome.into_plan(self.registry.default_id(), query.as_str());
        if used_fallback {
            info!(agent = self.registry.default_id(), "using fallback plan");
        }
        (plan, used_fallback)
    }

    // -----------------------------------------------------------------------
    // Fan-out / fan-in
    // -----------------------------------------------------------------------

    /// Runs every resolvable step concurrently.
    ///
    /// Returns one slot per plan step, in plan order: `None` for skipped
    /// steps, otherwise the specialist id and its response.
    async fn fan_out(
        &self,
        plan: &RoutingPlan,
        token: &CancellationToken,
    ) -> Result<Vec<Option<(String, AgentResponse)>>, AgentError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<(String, AgentResponse)>> = vec![None; plan.len()];
        let mut resolved = vec![None; plan.len()];

        for (idx, PlanStep { agent, query }) in plan.steps.iter().enumerate() {
            let Some(specialist) = self.registry.get(agent) else {
                warn!(agent = %agent, "unknown specialist, step skipped");
                continue;
            };
            resolved[idx] = Some(specialist.id().to_string());

            let sem = Arc::clone(&semaphore);
            let sub_query = query.clone();
            tasks.spawn(async move {
                let response = match sem.acquire().await {
                    Ok(_permit) => {
                        match AssertUnwindSafe(specialist.answer(&sub_query))
                            .catch_unwind()
                            .await
                        {
                            Ok(response) => response,
                            Err(payload) => AgentResponse::error(
                                format!("Agent error: {}", panic_message(payload.as_ref())),
                                Vec::new(),
                            ),
                        }
                    }
                    Err(e) => AgentResponse::error(format!("Agent error: {e}"), Vec::new()),
                };
                (idx, response)
            });
        }

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tasks.abort_all();
                    debug!("request cancelled during fan-out");
                    return Err(AgentError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((idx, response))) => {
                        if let Some(id) = resolved[idx].clone() {
                            debug!(agent = %id, status = %response.status, "specialist responded");
                            slots[idx] = Some((id, response));
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "specialist task failed"),
                },
            }
        }

        // A task lost to a join failure still yields a response
        for (slot, id) in slots.iter_mut().zip(resolved) {
            if slot.is_none()
                && let Some(id) = id
            {
                *slot = Some((
                    id,
                    AgentResponse::error("Agent error: specialist task failed", Vec::new()),
                ));
            }
        }
        Ok(slots)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("gate", &self.gate)
            .field("registry", &self.registry)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

/// Loads the configured specialist profiles, or the built-in set.
///
/// # Errors
///
/// Returns [`AgentError::Configuration`] if the specialists file is invalid.
pub fn resolve_profiles(config: &AgentConfig) -> Result<Vec<SpecialistProfile>, AgentError> {
    config
        .specialists_file
        .as_deref()
        .map_or_else(|| Ok(default_profiles()), load_profiles)
}

/// Builds one [`ToolAgent`] per configured profile over shared providers.
///
/// # Errors
///
/// Returns [`AgentError`] if the corpus, database or specialists file
/// cannot be loaded, or an identifier repeats.
pub fn build_registry(
    config: &AgentConfig,
    provider: &Arc<dyn LlmProvider>,
    prompts: &PromptSet,
) -> Result<SpecialistRegistry, AgentError> {
    let index = Arc::new(match config.corpus_path {
        Some(ref path) => CorpusIndex::load(path)?,
        None => CorpusIndex::from_documents(Vec::new()),
    });
    let structured: Option<Arc<dyn StructuredQuery>> = match config.database_path {
        Some(ref path) => Some(Arc::new(SqliteQuery::open(path.clone())?)),
        None => None,
    };

    let mut registry = SpecialistRegistry::new(&config.default_specialist);
    for profile in resolve_profiles(config)? {
        let retriever = Arc::new(CorpusRetriever::new(
            Arc::clone(&index),
            profile.domains.clone(),
        ));
        let executor = ToolExecutor::new(
            retriever,
            structured.clone(),
            config.retrieval_top_k,
            config.timeout,
        );
        let agent = ToolAgent::new(
            profile.clone(),
            Arc::clone(provider),
            executor,
            config,
            prompts.specialist.clone(),
        )?;
        registry.register(profile, Arc::new(agent))?;
    }
    debug!(
        specialists = registry.len(),
        documents = index.len(),
        structured_query = structured.is_some(),
        "specialist registry built"
    );
    Ok(registry)
}

/// Races `call` against cancellation of `token`.
async fn cancellable<T>(
    token: &CancellationToken,
    call: impl Future<Output = T>,
) -> Result<T, AgentError> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(AgentError::Cancelled),
        value = call => Ok(value),
    }
}

fn finish(answer: &str, evidence: Vec<String>, trace: RouteTrace, start: Instant) -> QueryResult {
    QueryResult {
        answer: answer.to_string(),
        evidence,
        trace,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::finding::ResponseStatus;
    use crate::agent::gate::{GREETING_REPLY, OUT_OF_SCOPE_REPLY};
    use crate::agent::testing::{
        FixedClassifier, RecordingSpecialist, ScriptedProvider, StaticRetriever,
    };
    use std::time::Duration;

    struct Harness {
        orchestrator: Orchestrator,
        provider: Arc<ScriptedProvider>,
        classifier: Arc<FixedClassifier>,
        specialists: Vec<Arc<RecordingSpecialist>>,
    }

    const SHORT_TIMEOUT: Duration = Duration::from_millis(50);
    const SLOW: Duration = Duration::from_millis(500);

    fn config_with_timeout(timeout: Duration) -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn config() -> AgentConfig {
        config_with_timeout(Duration::from_secs(5))
    }

    fn harness(
        classifier: FixedClassifier,
        replies: Vec<&str>,
        specialists: Vec<RecordingSpecialist>,
    ) -> Harness {
        build_harness(
            classifier,
            ScriptedProvider::new(replies),
            &config(),
            specialists,
            Vec::new(),
        )
    }

    /// Registers `extra` specialists before the recording ones.
    fn build_harness(
        classifier: FixedClassifier,
        provider: ScriptedProvider,
        config: &AgentConfig,
        specialists: Vec<RecordingSpecialist>,
        extra: Vec<Arc<dyn crate::agent::traits::Specialist>>,
    ) -> Harness {
        let provider = Arc::new(provider);
        let classifier = Arc::new(classifier);
        let specialists: Vec<Arc<RecordingSpecialist>> =
            specialists.into_iter().map(Arc::new).collect();

        let mut registry = SpecialistRegistry::new("GENERAL");
        let recording = specialists
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn crate::agent::traits::Specialist>);
        for specialist in extra.into_iter().chain(recording) {
            let id = specialist.id().to_string();
            registry
                .register(SpecialistProfile::new(&id, &id, "test specialist"), specialist)
                .unwrap_or_else(|_| unreachable!());
        }

        let orchestrator = Orchestrator::new(
            provider.clone(),
            classifier.clone(),
            registry,
            config,
            &PromptSet::defaults(),
        )
        .unwrap_or_else(|_| unreachable!());
        Harness {
            orchestrator,
            provider,
            classifier,
            specialists,
        }
    }

    fn specialist(id: &str, text: &str) -> RecordingSpecialist {
        RecordingSpecialist::new(id, AgentResponse::ok(text, vec![format!("{id} evidence")]))
    }

    fn domain() -> FixedClassifier {
        FixedClassifier::new("ACADEMIC", 90.0)
    }

    use crate::agent::traits::Specialist as _;

    #[tokio::test]
    async fn test_gate_short_circuits_without_provider_calls() {
        for (label, reply) in [("OUT_OF_SCOPE", OUT_OF_SCOPE_REPLY), ("GREETING", GREETING_REPLY)] {
            let h = harness(
                FixedClassifier::new(label, 61.0),
                vec![],
                vec![specialist("GENERAL", "x")],
            );
            let result = h.orchestrator.run("hello there").await;
            assert_eq!(result.answer, reply);
            assert!(result.trace.short_circuited);
            assert_eq!(h.provider.call_count(), 0);
            assert!(h.specialists[0].calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_gated_label_at_threshold_is_planned_once() {
        let h = harness(
            FixedClassifier::new("GREETING", 60.0),
            vec![r#"{"plan": [{"agent": "GENERAL", "query": "hi"}]}"#, "Hello!"],
            vec![specialist("GENERAL", "greeting handled")],
        );
        let result = h.orchestrator.run("hi").await;
        assert_eq!(result.answer, "Hello!");
        let planner_calls = h.provider.requests().iter().filter(|r| r.json_mode).count();
        assert_eq!(planner_calls, 1);
        assert_eq!(h.classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_plan_falls_back_to_default() {
        let h = harness(
            domain(),
            vec!["I am not sure how to route this.", "Building A is on the left."],
            vec![specialist("ACADEMIC", "a"), specialist("GENERAL", "Building A")],
        );
        let query = "  Where is building A?  ";
        let result = h.orchestrator.run(query).await;
        assert!(result.trace.used_fallback_plan);
        assert_eq!(h.specialists[1].calls(), vec![query.to_string()]);
        assert!(h.specialists[0].calls().is_empty());
        assert_eq!(result.answer, "Building A is on the left.");
    }

    #[tokio::test]
    async fn test_unknown_agent_is_skipped() {
        let h = harness(
            domain(),
            vec![
                r#"{"plan":[{"agent":"X","query":"q1"},{"agent":"KNOWN","query":"q2"}]}"#,
                "final",
            ],
            vec![specialist("KNOWN", "known answer"), specialist("GENERAL", "g")],
        );
        let result = h.orchestrator.run("question").await;
        assert_eq!(h.specialists[0].calls(), vec!["q2".to_string()]);
        assert_eq!(result.evidence, vec!["KNOWN evidence".to_string()]);
        assert_eq!(result.trace.steps.len(), 2);
        assert_eq!(result.trace.steps[0].status, None);
        assert_eq!(result.trace.steps[1].status, Some(ResponseStatus::Ok));

        let requests = h.provider.requests();
        let synthesis = &requests[1].messages[1].content;
        assert_eq!(synthesis.matches("]: ").count(), 1);
        assert!(synthesis.contains("[KNOWN]: known answer"));
    }

    #[tokio::test]
    async fn test_all_unknown_agents_skip_synthesis() {
        let h = harness(
            domain(),
            vec![r#"{"plan":[{"agent":"X","query":"q1"}]}"#],
            vec![specialist("GENERAL", "g")],
        );
        let result = h.orchestrator.run("question").await;
        assert_eq!(result.answer, NO_MATCH_REPLY);
        assert!(!result.trace.synthesized);
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_steps_without_agent_are_skipped_not_fallen_back() {
        let h = harness(
            domain(),
            vec![r#"{"plan":[{"query":"q1"}]}"#],
            vec![specialist("GENERAL", "g")],
        );
        let result = h.orchestrator.run("question").await;
        assert_eq!(result.answer, NO_MATCH_REPLY);
        assert!(!result.trace.used_fallback_plan);
        assert!(!result.trace.synthesized);
        assert!(h.specialists[0].calls().is_empty());
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_specialist_timeout_is_isolated() {
        let slow_provider = Arc::new(
            ScriptedProvider::new(vec!["Final Answer: too late"]).with_delay(SLOW),
        );
        let executor = ToolExecutor::new(
            Arc::new(StaticRetriever::new(vec![])),
            None,
            3,
            SHORT_TIMEOUT,
        );
        let config = config_with_timeout(SHORT_TIMEOUT);
        let academic = ToolAgent::new(
            SpecialistProfile::new("ACADEMIC", "Academic", "test specialist"),
            slow_provider,
            executor,
            &config,
            "specialist".to_string(),
        )
        .unwrap_or_else(|_| unreachable!());

        let h = build_harness(
            domain(),
            ScriptedProvider::new(vec![
                r#"{"plan":[{"agent":"ACADEMIC","query":"gpa"},{"agent":"GENERAL","query":"where"}]}"#,
                "partial answer",
            ]),
            &config,
            vec![specialist("GENERAL", "Room 101")],
            vec![Arc::new(academic) as Arc<dyn crate::agent::traits::Specialist>],
        );
        let result = h.orchestrator.run("GPA and room?").await;
        assert_eq!(result.answer, "partial answer");
        assert_eq!(result.trace.steps[0].status, Some(ResponseStatus::Error));
        assert_eq!(result.trace.steps[1].status, Some(ResponseStatus::Ok));
        assert_eq!(h.specialists[0].calls(), vec!["where".to_string()]);

        let requests = h.provider.requests();
        let synthesis = &requests[1].messages[1].content;
        assert!(synthesis.contains("[ACADEMIC]: Agent error: specialist completion timed out"));
        assert!(synthesis.contains("[GENERAL]: Room 101"));
    }

    #[tokio::test]
    async fn test_planner_timeout_falls_back_to_default() {
        let h = build_harness(
            domain(),
            ScriptedProvider::new(vec!["synthesized"]).with_delay_on_call(0, SLOW),
            &config_with_timeout(SHORT_TIMEOUT),
            vec![specialist("GENERAL", "g")],
            Vec::new(),
        );
        let result = h.orchestrator.run("Where is building A?").await;
        assert!(result.trace.used_fallback_plan);
        assert_eq!(
            h.specialists[0].calls(),
            vec!["Where is building A?".to_string()]
        );
        assert_eq!(result.answer, "synthesized");
        assert_eq!(h.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_synthesizer_timeout_returns_apology() {
        let h = build_harness(
            domain(),
            ScriptedProvider::new(vec![r#"{"plan":[{"agent":"GENERAL","query":"q"}]}"#, "late"])
                .with_delay_on_call(1, SLOW),
            &config_with_timeout(SHORT_TIMEOUT),
            vec![specialist("GENERAL", "g")],
            Vec::new(),
        );
        let result = h.orchestrator.run("question").await;
        assert_eq!(result.answer, APOLOGY_REPLY);
        assert!(!result.trace.used_fallback_plan);
        assert_eq!(result.evidence, vec!["GENERAL evidence".to_string()]);
    }

    #[tokio::test]
    async fn test_classifier_timeout_still_plans() {
        let h = build_harness(
            FixedClassifier::new("OUT_OF_SCOPE", 99.0).with_delay(SLOW),
            ScriptedProvider::new(vec![r#"{"plan":[{"agent":"GENERAL","query":"q"}]}"#, "done"]),
            &config_with_timeout(SHORT_TIMEOUT),
            vec![specialist("GENERAL", "g")],
            Vec::new(),
        );
        let result = h.orchestrator.run("question").await;
        assert_eq!(result.answer, "done");
        assert!(!result.trace.short_circuited);
        assert!(result.trace.classification.is_none());
        assert_eq!(h.classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_fan_in_preserves_plan_order() {
        let h = harness(
            domain(),
            vec![
                r#"{"plan":[{"agent":"ACADEMIC","query":"gpa"},{"agent":"FINANCIAL","query":"debt"}]}"#,
                "combined",
            ],
            vec![
                specialist("ACADEMIC", "GPA 3.2").with_delay(Duration::from_millis(80)),
                specialist("FINANCIAL", "No debt"),
                specialist("GENERAL", "g"),
            ],
        );
        let result = h.orchestrator.run("GPA and debt of B?").await;
        assert_eq!(result.answer, "combined");
        assert_eq!(
            result.evidence,
            vec!["ACADEMIC evidence".to_string(), "FINANCIAL evidence".to_string()]
        );

        let requests = h.provider.requests();
        let synthesis = &requests[1].messages[1].content;
        let academic = synthesis.find("[ACADEMIC]: GPA 3.2").unwrap_or(usize::MAX);
        let financial = synthesis.find("[FINANCIAL]: No debt").unwrap_or(0);
        assert!(academic < financial);
    }

    #[tokio::test]
    async fn test_panicking_specialist_is_isolated() {
        let h = harness(
            domain(),
            vec![
                r#"{"plan":[{"agent":"ACADEMIC","query":"gpa"},{"agent":"GENERAL","query":"where"}]}"#,
                "partial answer",
            ],
            vec![
                specialist("ACADEMIC", "never").panicking(),
                specialist("GENERAL", "Room 101"),
            ],
        );
        let result = h.orchestrator.run("GPA and room?").await;
        assert_eq!(result.answer, "partial answer");
        assert_eq!(result.trace.steps[0].status, Some(ResponseStatus::Error));
        assert_eq!(result.trace.steps[1].status, Some(ResponseStatus::Ok));

        let requests = h.provider.requests();
        let synthesis = &requests[1].messages[1].content;
        assert!(synthesis.contains("[ACADEMIC]: Agent error: specialist ACADEMIC crashed"));
    }

    #[tokio::test]
    async fn test_synthesizer_failure_returns_apology() {
        let h = harness(
            domain(),
            vec![r#"{"plan":[{"agent":"GENERAL","query":"q"}]}"#],
            vec![specialist("GENERAL", "g")],
        );
        let result = h.orchestrator.run("question").await;
        assert_eq!(result.answer, APOLOGY_REPLY);
        assert!(result.trace.synthesized);
        assert_eq!(result.evidence, vec!["GENERAL evidence".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_and_oversized_queries_rejected() {
        let h = harness(domain(), vec![], vec![specialist("GENERAL", "g")]);
        assert_eq!(h.orchestrator.run("   ").await.answer, NO_MATCH_REPLY);
        assert_eq!(
            h.orchestrator.run(&"x".repeat(10_001)).await.answer,
            NO_MATCH_REPLY
        );
        assert_eq!(h.classifier.calls(), 0);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_classifier_still_plans() {
        let h = harness(
            FixedClassifier::failing(),
            vec![r#"{"plan":[{"agent":"GENERAL","query":"q"}]}"#, "done"],
            vec![specialist("GENERAL", "g")],
        );
        let result = h.orchestrator.run("question").await;
        assert_eq!(result.answer, "done");
        assert!(result.trace.classification.is_none());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_request() {
        let h = harness(
            domain(),
            vec![r#"{"plan":[{"agent":"GENERAL","query":"q"}]}"#, "late"],
            vec![specialist("GENERAL", "g").with_delay(Duration::from_secs(30))],
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let result = h.orchestrator.run_cancellable("question", &token).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_plan_only() {
        let h = harness(
            domain(),
            vec!["garbage"],
            vec![specialist("GENERAL", "g")],
        );
        let (plan, used_fallback) = h
            .orchestrator
            .plan_only("Where?")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(used_fallback);
        assert_eq!(plan.steps, vec![PlanStep::new("GENERAL", "Where?")]);
        assert!(h.orchestrator.plan_only("").await.is_err());
    }

    #[test]
    fn test_missing_default_specialist_rejected() {
        let result = Orchestrator::new(
            Arc::new(ScriptedProvider::new(vec![])),
            Arc::new(domain()),
            SpecialistRegistry::new("GENERAL"),
            &config(),
            &PromptSet::defaults(),
        );
        assert!(matches!(result, Err(AgentError::Configuration { .. })));
    }

    #[test]
    fn test_build_registry_from_files() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let corpus = dir.path().join("corpus.jsonl");
        std::fs::write(
            &corpus,
            "{\"text\": \"Dormitory fees are due in August.\", \"source\": \"dorm.md\", \"domain\": \"STUDENT_LIFE\"}\n",
        )
        .unwrap_or_else(|_| unreachable!());
        let config = AgentConfig::builder()
            .api_key("test")
            .corpus_path(&corpus)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));
        let registry = build_registry(&config, &provider, &PromptSet::defaults())
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(registry.len(), 5);
        assert!(registry.validate().is_ok());
        assert!(registry.get("student_life").is_some());
    }

    #[test]
    fn test_from_config_without_data_sources() {
        let orchestrator = Orchestrator::from_config(&config()).unwrap_or_else(|_| unreachable!());
        assert_eq!(orchestrator.registry().len(), 5);
        assert_eq!(orchestrator.registry().default_id(), "GENERAL");
    }

    #[test]
    fn test_build_registry_missing_corpus() {
        let config = AgentConfig::builder()
            .api_key("test")
            .corpus_path("/nonexistent/corpus.jsonl")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));
        assert!(build_registry(&config, &provider, &PromptSet::defaults()).is_err());
    }
}
