//! # uniroute
//!
//! Routes natural-language questions about a university through an intent
//! gate, an LLM routing planner, tool-using domain specialists and a final
//! synthesis step.
//!
//! ## Pipeline
//!
//! - [`agent::IntentGate`] answers confident out-of-scope and greeting
//!   messages with a canned reply.
//! - [`agent::PlannerAgent`] splits the question into sub-queries, one per
//!   specialist, falling back to the default specialist when its output is
//!   unusable.
//! - [`agent::ToolAgent`] answers a sub-query with a bounded ReAct loop
//!   over document search and read-only SQL tools.
//! - [`agent::Orchestrator`] runs the plan concurrently, keeps plan order
//!   and hands the outputs to [`agent::SynthesizerAgent`].
//!
//! ## Example
//!
//! ```no_run
//! use uniroute::agent::{AgentConfig, Orchestrator};
//!
//! # async fn demo() -> Result<(), uniroute::error::AgentError> {
//! let config = AgentConfig::builder()
//!     .api_key("sk-...")
//!     .corpus_path("regulations.jsonl")
//!     .build()?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//! let result = orchestrator.run("When is the tuition deadline?").await;
//! assert!(!result.answer.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod capability;
pub mod cli;
pub mod error;

pub use agent::{AgentConfig, Orchestrator, QueryResult};
pub use error::{AgentError, CommandError, Error, Result};
