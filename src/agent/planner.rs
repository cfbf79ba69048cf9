//! Routing planner.
//!
//! Asks a completion provider to decompose the user question into
//! `(specialist, sub-query)` steps and parses the free-text reply into a
//! [`RoutingPlan`]. Unusable output never raises: the caller receives
//! [`PlanOutcome::Fallback`] and substitutes the single-step default plan.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::finding::{PlanStep, RoutingPlan};
use super::prompt::build_planner_prompt;
use super::provider::{LlmProvider, with_timeout};
use super::registry::SpecialistProfile;
use super::traits::Agent;

/// Result of one planning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The model produced a usable, non-empty plan.
    Planned(RoutingPlan),
    /// The plan could not be obtained; carries the reason for logging.
    Fallback {
        /// Why the planner output was unusable.
        reason: String,
    },
}

impl PlanOutcome {
    /// Resolves to a plan, substituting the default single-step plan on
    /// fallback.
    #[must_use]
    pub fn into_plan(self, default_agent: &str, query: &str) -> (RoutingPlan, bool) {
        match self {
            Self::Planned(plan) => (plan, false),
            Self::Fallback { .. } => (RoutingPlan::fallback(default_agent, query), true),
        }
    }
}

/// Returns the first balanced `{...}` object in `text`.
///
/// Scans from the first `{`, counting depth up on `{` and down on `}`, and
/// stops the moment depth returns to zero. Braces inside JSON strings are
/// counted like any other. Returns `None` when there is no `{` or the
/// object never closes.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct WirePlan {
    #[serde(default)]
    plan: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    #[serde(default)]
    agent: Option<Value>,
    #[serde(default)]
    query: Option<Value>,
}

/// Non-blank string content of a wire field.
fn text_field(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        _ => None,
    }
}

/// Parses raw planner output into a plan.
///
/// Every listed step is kept. A step whose agent is missing, blank or not a
/// string gets an empty agent id, which never resolves, so the orchestrator
/// skips it. Steps without a query inherit the original question.
///
/// # Errors
///
/// Returns the fallback reason when no object is found, the object is not a
/// plan, or the plan lists no steps.
pub fn parse_plan(raw: &str, query: &str) -> Result<RoutingPlan, String> {
    let candidate = extract_json_object(raw).ok_or_else(|| "no JSON object in output".to_string())?;
    let wire: WirePlan =
        serde_json::from_str(candidate).map_err(|e| format!("invalid plan JSON: {e}"))?;

    if wire.plan.is_empty() {
        return Err("plan has no steps".to_string());
    }

    let steps = wire
        .plan
        .into_iter()
        .map(|step| {
            let agent = text_field(step.agent).unwrap_or_default();
            let sub_query = text_field(step.query).unwrap_or_else(|| query.to_string());
            PlanStep::new(agent, sub_query)
        })
        .collect();
    Ok(RoutingPlan::new(steps))
}

/// Agent that builds the routing plan.
pub struct PlannerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    timeout: std::time::Duration,
}

impl PlannerAgent {
    /// Creates a planner with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.planner_max_tokens,
            system_prompt,
            timeout: config.timeout,
        }
    }

    /// Plans one query against the specialist catalog.
    ///
    /// Provider failures and timeouts are reported as fallbacks, like
    /// unusable output.
    pub async fn plan(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        specialists: &[SpecialistProfile],
    ) -> PlanOutcome {
        let user_msg = build_planner_prompt(query, specialists);
        let completion = match with_timeout(
            "planner completion",
            self.timeout,
            self.execute(provider, &user_msg),
        )
        .await
        {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "planner call failed");
                return PlanOutcome::Fallback {
                    reason: e.to_string(),
                };
            }
        };

        match parse_plan(&completion.content, query) {
            Ok(plan) => {
                debug!(steps = plan.len(), "routing plan parsed");
                PlanOutcome::Planned(plan)
            }
            Err(reason) => {
                warn!(reason = %reason, "planner output unusable");
                PlanOutcome::Fallback { reason }
            }
        }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &'static str {
        "planner"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
