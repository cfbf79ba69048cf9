//! Tool catalog for specialist reasoning loops.
//!
//! Provides provider-agnostic tool definitions, the parsed action a model
//! asks for, and the observation fed back to it. Tools expose the
//! retrieval and structured-query capabilities to a specialist.

use serde::{Deserialize, Serialize};

/// Name of the retrieval tool.
pub const SEARCH_DOCUMENTS: &str = "search_documents";
/// Name of the structured-query execution tool.
pub const SQL_DB_QUERY: &str = "sql_db_query";
/// Name of the schema description tool.
pub const SQL_DB_SCHEMA: &str = "sql_db_schema";

/// A tool a specialist may call from its reasoning loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the dispatch table in the executor).
    pub name: String,
    /// Human-readable description of what the tool does and expects.
    pub description: String,
    /// When set, the tool's observation ends the loop as the final answer.
    pub return_direct: bool,
}

/// A tool invocation parsed from model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw input text for the tool.
    pub input: String,
}

impl ToolCall {
    /// Creates a tool call.
    #[must_use]
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
        }
    }
}

/// The observation produced by executing a tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Observation text shown to the model.
    pub content: String,
    /// Evidence items gathered by this call, in touch order.
    pub evidence: Vec<String>,
    /// Whether this result represents an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Successful observation with evidence.
    #[must_use]
    pub fn ok(content: impl Into<String>, evidence: Vec<String>) -> Self {
        Self {
            content: content.into(),
            evidence,
            is_error: false,
        }
    }

    /// Failed observation.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            evidence: Vec::new(),
            is_error: true,
        }
    }
}

/// The set of tools available to one specialist.
///
/// The structured-query tools are only present when a structured-query
/// provider is configured.
#[derive(Debug, Clone)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Tool set for a specialist.
    #[must_use]
    pub fn for_specialist(with_structured_query: bool) -> Self {
        let mut definitions = vec![def_search_documents()];
        if with_structured_query {
            definitions.push(def_sql_db_query());
            definitions.push(def_sql_db_schema());
        }
        Self { definitions }
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Returns the tool names in catalog order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Renders `name: description` lines for the reasoning prompt.
    #[must_use]
    pub fn describe(&self) -> String {
        self.definitions
            .iter()
            .map(|d| format!("{}: {}", d.name, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Renders the comma-separated tool names for the reasoning prompt.
    #[must_use]
    pub fn name_list(&self) -> String {
        self.names().join(", ")
    }

    /// Observation returned when the model names a tool outside this set.
    #[must_use]
    pub fn invalid_tool_observation(&self, name: &str) -> String {
        format!(
            "{name} is not a valid tool, try one of [{}].",
            self.name_list()
        )
    }
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

fn def_search_documents() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_DOCUMENTS.to_string(),
        description: "Search the university document collection for passages relevant to \
                       a question. Input is a short search phrase."
            .to_string(),
        return_direct: false,
    }
}

fn def_sql_db_query() -> ToolDefinition {
    ToolDefinition {
        name: SQL_DB_QUERY.to_string(),
        description: "Execute one read-only SQL SELECT statement against the university \
                       database and return the rows. If the query is wrong an error message \
                       is returned; check the schema with sql_db_schema first."
            .to_string(),
        return_direct: true,
    }
}

fn def_sql_db_schema() -> ToolDefinition {
    ToolDefinition {
        name: SQL_DB_SCHEMA.to_string(),
        description: "Describe database tables. Input is a comma-separated list of table \
                       names, or empty for every table."
            .to_string(),
        return_direct: false,
    }
}
