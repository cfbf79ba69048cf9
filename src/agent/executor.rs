//! Tool executor that dispatches tool calls to capability providers.
//!
//! Maps tool names to retrieval and structured-query calls, each bounded by
//! the configured per-call timeout. Inputs written by the model are
//! cleaned before dispatch.

use std::sync::Arc;
use std::time::Duration;

use super::provider::with_timeout;
use super::tool::{SEARCH_DOCUMENTS, SQL_DB_QUERY, SQL_DB_SCHEMA, ToolCall, ToolResult};
use crate::capability::{Retriever, StructuredQuery};
use crate::error::AgentError;

/// Maximum byte length of a tool input written by the model.
const MAX_TOOL_INPUT_LEN: usize = 10_000;
/// Observation when retrieval finds nothing.
pub const RETRIEVAL_EMPTY: &str = "No matching documents were found.";

/// Executes tool calls against the specialist's capability handles.
///
/// Holds shared read-only provider handles, so one executor per specialist
/// can serve any number of concurrent requests.
pub struct ToolExecutor {
    retriever: Arc<dyn Retriever>,
    structured: Option<Arc<dyn StructuredQuery>>,
    top_k: usize,
    timeout: Duration,
}

impl ToolExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        retriever: Arc<dyn Retriever>,
        structured: Option<Arc<dyn StructuredQuery>>,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            structured,
            top_k,
            timeout,
        }
    }

    /// Returns `true` if the structured-query tools can run.
    #[must_use]
    pub const fn has_structured_query(&self) -> bool {
        self.structured.is_some()
    }

    /// Dispatches a tool call.
    ///
    /// Structured-query failures become `"Error: ..."` observations so the
    /// model (or the caller, for return-direct tools) sees them.
    ///
    /// # Errors
    ///
    /// Propagates retrieval failures and timeouts of any tool.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, AgentError> {
        if call.input.len() > MAX_TOOL_INPUT_LEN {
            return Ok(ToolResult::error(format!(
                "Error: tool input too large ({} bytes, max {MAX_TOOL_INPUT_LEN})",
                call.input.len()
            )));
        }
        let input = clean_tool_input(&call.input);

        match call.name.as_str() {
            SEARCH_DOCUMENTS => self.search_documents(&input).await,
            SQL_DB_QUERY => self.sql_db_query(&input).await,
            SQL_DB_SCHEMA => self.sql_db_schema(&input).await,
            other => Ok(ToolResult::error(format!("Error: unknown tool {other}"))),
        }
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    async fn search_documents(&self, query: &str) -> Result<ToolResult, AgentError> {
        let passages = with_timeout(
            "retrieval",
            self.timeout,
            self.retriever.retrieve(query, self.top_k),
        )
        .await?;

        if passages.is_empty() {
            return Ok(ToolResult::ok(RETRIEVAL_EMPTY, Vec::new()));
        }

        let evidence: Vec<String> = passages.into_iter().map(|p| p.text).collect();
        Ok(ToolResult::ok(evidence.join("\n\n"), evidence))
    }

    async fn sql_db_query(&self, statement: &str) -> Result<ToolResult, AgentError> {
        let Some(ref structured) = self.structured else {
            return Ok(ToolResult::error("Error: no database is configured"));
        };

        match with_timeout("structured query", self.timeout, structured.execute(statement)).await
        {
            Ok(rows) => Ok(ToolResult::ok(rows.clone(), vec![rows])),
            Err(e @ AgentError::Timeout { .. }) => Err(e),
            Err(e) => Ok(ToolResult::error(format!("Error: {e}"))),
        }
    }

    async fn sql_db_schema(&self, input: &str) -> Result<ToolResult, AgentError> {
        let Some(ref structured) = self.structured else {
            return Ok(ToolResult::error("Error: no database is configured"));
        };

        let tables: Vec<String> = input
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        match with_timeout("schema lookup", self.timeout, structured.describe(&tables)).await {
            Ok(schema) => Ok(ToolResult::ok(schema, Vec::new())),
            Err(e @ AgentError::Timeout { .. }) => Err(e),
            Err(e) => Ok(ToolResult::error(format!("Error: {e}"))),
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("structured_query", &self.structured.is_some())
            .field("top_k", &self.top_k)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Strips markdown fences, backticks and surrounding double quotes.
#[must_use]
pub fn clean_tool_input(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop a language tag on the fence line
        text = rest
            .split_once('\n')
            .map_or(rest, |(first, body)| {
                if first.trim().chars().all(char::is_alphanumeric) {
                    body
                } else {
                    rest
                }
            });
    }
    let cleaned = text.replace('`', "");
    let cleaned = cleaned.trim();
    let cleaned = cleaned
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(cleaned);
    cleaned.trim().to_string()
}
