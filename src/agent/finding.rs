//! Data types flowing through the routing pipeline.
//!
//! Classification results, routing plans, per-specialist responses and the
//! final query result. Everything here is created once per request and
//! owned by the orchestrator for the lifetime of that request.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum accepted query length in bytes.
pub const MAX_QUERY_LEN: usize = 10_000;

/// A user question accepted for routing.
///
/// The text is kept verbatim; the fallback plan hands it to the default
/// specialist unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    /// Accepts `raw` unless it is blank or longer than [`MAX_QUERY_LEN`].
    #[must_use]
    pub fn accept(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() || raw.len() > MAX_QUERY_LEN {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// The question text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label produced by the intent classifier.
///
/// Only [`IntentLabel::OutOfScope`] and [`IntentLabel::Greeting`] are gated;
/// every domain label simply proceeds to planning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntentLabel {
    /// Question unrelated to the university.
    OutOfScope,
    /// Social small talk.
    Greeting,
    /// Any domain label (e.g. `ACADEMIC`, `FINANCIAL`).
    Domain(String),
}

impl IntentLabel {
    /// Parses a classifier label (case-insensitive, `-`/space tolerant).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "OUT_OF_SCOPE" | "OOS" => Self::OutOfScope,
            "GREETING" => Self::Greeting,
            _ => Self::Domain(normalized),
        }
    }

    /// Returns the canonical label string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::OutOfScope => "OUT_OF_SCOPE",
            Self::Greeting => "GREETING",
            Self::Domain(label) => label,
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IntentLabel {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IntentLabel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(Self::parse(&raw))
    }
}

/// Output of the intent classifier for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Predicted label.
    pub label: IntentLabel,
    /// Confidence in percent (0–100).
    pub confidence: f32,
}

impl ClassificationResult {
    /// Creates a result, clamping confidence into 0–100.
    #[must_use]
    pub fn new(label: IntentLabel, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self { label, confidence }
    }
}

/// One assignment of a sub-query to a specialist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Specialist identifier. Need not be registered.
    pub agent: String,
    /// Sub-query handed to the specialist.
    pub query: String,
}

impl PlanStep {
    /// Creates a plan step.
    #[must_use]
    pub fn new(agent: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            query: query.into(),
        }
    }
}

/// Ordered routing plan for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPlan {
    /// Steps in execution (and synthesis) order.
    pub steps: Vec<PlanStep>,
}

impl RoutingPlan {
    /// Creates a plan from steps.
    #[must_use]
    pub const fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// Single-step plan sending the untouched query to the default specialist.
    #[must_use]
    pub fn fallback(default_agent: &str, query: &str) -> Self {
        Self::new(vec![PlanStep::new(default_agent, query)])
    }

    /// Returns `true` if the plan has no steps.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Outcome of a specialist invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Answer produced through the normal loop.
    Ok,
    /// Answer salvaged from unparsable model output.
    ParseRecovered,
    /// The specialist could not answer.
    Error,
}

impl ResponseStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ParseRecovered => "parse_recovered",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of one specialist for one plan step. Always produced, even on
/// internal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Answer text handed to the synthesizer.
    pub text: String,
    /// Retrieved passages or raw structured-query output, in touch order.
    pub evidence: Vec<String>,
    /// How the answer was obtained.
    pub status: ResponseStatus,
}

impl AgentResponse {
    /// Successful answer.
    #[must_use]
    pub fn ok(text: impl Into<String>, evidence: Vec<String>) -> Self {
        Self {
            text: text.into(),
            evidence,
            status: ResponseStatus::Ok,
        }
    }

    /// Answer recovered from malformed model output.
    #[must_use]
    pub fn recovered(text: impl Into<String>, evidence: Vec<String>) -> Self {
        Self {
            text: text.into(),
            evidence,
            status: ResponseStatus::ParseRecovered,
        }
    }

    /// Failed answer.
    #[must_use]
    pub fn error(text: impl Into<String>, evidence: Vec<String>) -> Self {
        Self {
            text: text.into(),
            evidence,
            status: ResponseStatus::Error,
        }
    }
}

/// One labelled entry of the synthesizer input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistOutput {
    /// Specialist identifier.
    pub agent: String,
    /// The specialist's response text.
    pub text: String,
}

/// Per-step diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTrace {
    /// Specialist identifier from the plan.
    pub agent: String,
    /// Sub-query from the plan.
    pub sub_query: String,
    /// Response status, or `None` when the step was skipped as unresolved.
    pub status: Option<ResponseStatus>,
}

/// How a request travelled through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTrace {
    /// Classification used by the gate, when the classifier answered.
    pub classification: Option<ClassificationResult>,
    /// The gate answered the request directly.
    pub short_circuited: bool,
    /// The planner output was unusable and the fallback plan ran.
    pub used_fallback_plan: bool,
    /// One entry per plan step, in plan order.
    pub steps: Vec<StepTrace>,
    /// Whether the synthesizer was invoked.
    pub synthesized: bool,
}

/// Final result of one request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// User-facing answer.
    pub answer: String,
    /// Evidence accumulated across specialists in plan order.
    pub evidence: Vec<String>,
    /// Routing diagnostics.
    pub trace: RouteTrace,
    /// Total elapsed time.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}
