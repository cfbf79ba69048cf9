//! Error types for uniroute.
//!
//! Library code returns [`AgentError`] from every fallible pipeline
//! operation; the CLI layer wraps it together with [`CommandError`] in the
//! top-level [`Error`].

use std::time::Duration;

use thiserror::Error;

/// Convenience result alias for CLI-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Pipeline or provider failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Command execution failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the CLI command layer.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not be carried out.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be rendered in the requested format.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),

    /// A command-line argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors raised inside the routing pipeline and its capability providers.
///
/// None of these ever reach the end user directly: the orchestrator turns
/// them into fixed natural-language strings and logs the detail.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for the completion provider.
    #[error("no API key configured (set UNIROUTE_API_KEY or OPENAI_API_KEY)")]
    ApiKeyMissing,

    /// The configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// A completion API request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error detail from the transport or SDK.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// A provider call exceeded its time budget.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which call timed out (e.g. `"planner completion"`).
        operation: &'static str,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// The request was cancelled by its caller.
    #[error("request cancelled")]
    Cancelled,

    /// Model output could not be parsed.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// The raw content that failed to parse.
        content: String,
    },

    /// A tool invoked by a specialist failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// A non-completion capability provider (classifier, retrieval,
    /// structured query) failed.
    #[error("{provider} provider failed: {message}")]
    Capability {
        /// Provider kind.
        provider: &'static str,
        /// Failure detail.
        message: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong.
        message: String,
    },

    /// Orchestration-level failure.
    #[error("orchestration failed: {message}")]
    Orchestration {
        /// Failure detail.
        message: String,
    },
}

impl AgentError {
    /// Shorthand for a [`AgentError::Configuration`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a [`AgentError::Capability`] error.
    pub fn capability(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Capability {
            provider,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = AgentError::Timeout {
            operation: "planner completion",
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "planner completion timed out after 5s");
    }

    #[test]
    fn test_agent_error_converts_to_top_level() {
        let err: Error = AgentError::Cancelled.into();
        assert!(matches!(err, Error::Agent(AgentError::Cancelled)));
        assert_eq!(err.to_string(), "request cancelled");
    }

    #[test]
    fn test_capability_shorthand() {
        let err = AgentError::capability("retrieval", "index missing");
        assert_eq!(err.to_string(), "retrieval provider failed: index missing");
    }
}
