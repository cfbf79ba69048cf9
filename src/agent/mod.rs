//! Routing pipeline for university questions.
//!
//! Routes each question through a confidence-gated intent check, an
//! LLM-built routing plan, tool-using domain specialists and a final
//! synthesis step. Completion calls go through a pluggable provider
//! abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── IntentGate (canned reply for confident out-of-scope / greeting)
//!   ├── PlannerAgent (JSON plan, single-step fallback to the default specialist)
//!   ├── Fan-out → one ToolAgent per resolved plan step
//!   │   └── bounded ReAct loop over search / SQL tools → AgentResponse
//!   ├── Fan-in in plan order (unknown specialists skipped)
//!   └── SynthesizerAgent → final answer + evidence
//! ```

pub mod agentic_loop;
pub mod client;
pub mod config;
pub mod executor;
pub mod finding;
pub mod gate;
pub mod message;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod recovery;
pub mod registry;
pub mod specialist;
pub mod synthesizer;
#[cfg(test)]
pub mod testing;
pub mod tool;
pub mod traits;

// Re-export key types
pub use config::AgentConfig;
pub use finding::{
    AgentResponse, ClassificationResult, IntentLabel, PlanStep, Query, QueryResult,
    ResponseStatus, RouteTrace, RoutingPlan,
};
pub use gate::{GateDecision, IntentGate};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use planner::{PlanOutcome, PlannerAgent};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use registry::{SpecialistProfile, SpecialistRegistry};
pub use specialist::ToolAgent;
pub use synthesizer::SynthesizerAgent;
pub use tool::{ToolCall, ToolDefinition, ToolResult, ToolSet};
pub use traits::{Agent, Specialist};
