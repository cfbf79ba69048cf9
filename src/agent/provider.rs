//! Pluggable completion provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. This keeps all agent logic decoupled
//! from any particular LLM vendor.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Trait for completion provider backends.
///
/// Implementations handle the transport layer for a specific provider while
/// presenting a uniform interface to agents. Handles are created once at
/// startup and shared read-only across requests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or malformed responses.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}

/// Runs a provider call under a time budget.
///
/// Exceeding the budget yields [`AgentError::Timeout`], which callers treat
/// exactly like any other provider failure.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    after: Duration,
    call: F,
) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, AgentError>>,
{
    tokio::time::timeout(after, call)
        .await
        .map_err(|_| AgentError::Timeout { operation, after })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout("test", Duration::from_secs(1), async {
            Ok::<_, AgentError>(7)
        })
        .await;
        assert_eq!(result.unwrap_or_default(), 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AgentError>(())
        })
        .await;
        assert!(matches!(
            result,
            Err(AgentError::Timeout {
                operation: "slow call",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_with_timeout_keeps_inner_error() {
        let result: Result<(), AgentError> = with_timeout("call", Duration::from_secs(1), async {
            Err(AgentError::Cancelled)
        })
        .await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
    }
}
