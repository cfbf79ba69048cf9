//! Bounded ReAct reasoning loop.
//!
//! Drives the model ↔ tool round-trip: renders the prompt with the
//! transcript so far, asks the model for its next step, executes the named
//! tool, appends the observation and repeats until the model declares a
//! final answer, a return-direct tool ends the loop, the output cannot be
//! parsed, or the round budget is spent.

use regex::Regex;
use tracing::debug;

use super::executor::ToolExecutor;
use super::message::ChatRequest;
use super::provider::{LlmProvider, with_timeout};
use super::recovery::{FINAL_ANSWER_MARKER, PARSE_FAILURE_MARKER};
use super::tool::{ToolCall, ToolResult, ToolSet};
use crate::error::AgentError;

/// Stop sequence that keeps the model from inventing observations.
pub const OBSERVATION_STOP: &str = "\nObservation:";

/// Message prefix when a completion holds both an action and an answer.
const BOTH_ACTION_AND_ANSWER: &str =
    "Parsing LLM output produced both a final answer and a parse-able action:";

/// Next step requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    /// Invoke a tool.
    Action(ToolCall),
    /// Declared final answer.
    Finish(String),
}

/// Model output that is neither a valid action nor a final answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// Failure message embedding the raw output.
    pub message: String,
}

/// Parser for `Thought:` / `Action:` / `Action Input:` / `Final Answer:` output.
#[derive(Debug, Clone)]
pub struct ReactParser {
    action: Regex,
}

impl ReactParser {
    /// Compiles the action grammar.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if the pattern fails to compile.
    pub fn new() -> Result<Self, AgentError> {
        let action = Regex::new(
            r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)",
        )
        .map_err(|e| AgentError::config(format!("invalid action pattern: {e}")))?;
        Ok(Self { action })
    }

    /// Parses one completion.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure`] when the output holds both an action and a
    /// final answer, or neither.
    pub fn parse(&self, text: &str) -> Result<AgentStep, ParseFailure> {
        let includes_answer = text.contains(FINAL_ANSWER_MARKER);

        if let Some(caps) = self.action.captures(text) {
            if includes_answer {
                return Err(ParseFailure {
                    message: format!("{BOTH_ACTION_AND_ANSWER}: {text}"),
                });
            }
            let name = caps.get(1).map_or("", |m| m.as_str());
            let input = caps.get(2).map_or("", |m| m.as_str());
            return Ok(AgentStep::Action(ToolCall::new(
                clean_action_name(name),
                input.trim_matches(' ').trim_matches('"'),
            )));
        }

        if includes_answer {
            let answer = text
                .rsplit(FINAL_ANSWER_MARKER)
                .next()
                .unwrap_or_default()
                .trim();
            return Ok(AgentStep::Finish(answer.to_string()));
        }

        Err(ParseFailure {
            message: format!("{PARSE_FAILURE_MARKER}: `{text}`"),
        })
    }
}

fn clean_action_name(raw: &str) -> String {
    let name = raw.trim().trim_matches(['`', '[', ']', '*']).trim();
    name.strip_suffix("()").unwrap_or(name).trim().to_string()
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEnd {
    /// The model declared a final answer.
    Final(String),
    /// A return-direct tool produced the answer.
    Direct(ToolResult),
    /// The model output could not be parsed; carries the failure message.
    Unparsable(String),
    /// The round budget was spent without a final answer.
    Aborted {
        /// The most recent observation, if any tool ran.
        last_observation: Option<String>,
    },
}

/// Result of one loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Terminal state.
    pub end: LoopEnd,
    /// Evidence gathered by tool calls, in touch order.
    pub evidence: Vec<String>,
    /// Reasoning rounds (completion calls) performed.
    pub rounds: usize,
}

/// Per-run loop parameters.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per reasoning round.
    pub max_tokens: u32,
    /// Time budget for each completion call.
    pub timeout: std::time::Duration,
    /// Reasoning-round budget.
    pub max_iterations: usize,
}

/// Runs the reasoning loop for one question.
///
/// `render` turns the transcript so far into the user message of the next
/// round; `system_prompt` stays fixed.
///
/// # Errors
///
/// Propagates provider failures, timeouts and retrieval failures. Every
/// model-output problem is reported through [`LoopEnd`] instead.
#[allow(clippy::too_many_arguments)]
pub async fn agentic_loop<F>(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    settings: &LoopSettings,
    parser: &ReactParser,
    tools: &ToolSet,
    executor: &ToolExecutor,
    render: F,
) -> Result<LoopOutcome, AgentError>
where
    F: Fn(&str) -> String + Send + Sync,
{
    let mut scratchpad = String::new();
    let mut evidence = Vec::new();
    let mut last_observation = None;

    for round in 0..settings.max_iterations {
        let request = ChatRequest {
            model: settings.model.clone(),
            messages: vec![
                super::message::system_message(system_prompt),
                super::message::user_message(&render(&scratchpad)),
            ],
            temperature: Some(0.0),
            max_tokens: Some(settings.max_tokens),
            json_mode: false,
            stop: vec![OBSERVATION_STOP.to_string()],
        };
        let response = with_timeout("specialist completion", settings.timeout, async {
            provider.chat(&request).await
        })
        .await?;
        let text = response.content;

        let call = match parser.parse(&text) {
            Ok(AgentStep::Finish(answer)) => {
                debug!(round, "reasoning loop reached a final answer");
                return Ok(LoopOutcome {
                    end: LoopEnd::Final(answer),
                    evidence,
                    rounds: round + 1,
                });
            }
            Ok(AgentStep::Action(call)) => call,
            Err(failure) => {
                debug!(round, "model output could not be parsed");
                return Ok(LoopOutcome {
                    end: LoopEnd::Unparsable(failure.message),
                    evidence,
                    rounds: round + 1,
                });
            }
        };

        let observation = if let Some(definition) = tools.get(&call.name) {
            let result = executor.execute(&call).await?;
            debug!(
                round,
                tool = call.name,
                is_error = result.is_error,
                chars = result.content.len(),
                "tool execution complete"
            );
            evidence.extend(result.evidence.iter().cloned());
            if definition.return_direct {
                return Ok(LoopOutcome {
                    end: LoopEnd::Direct(result),
                    evidence,
                    rounds: round + 1,
                });
            }
            result.content
        } else {
            debug!(round, tool = call.name, "model named an unknown tool");
            tools.invalid_tool_observation(&call.name)
        };

        scratchpad.push_str(&text);
        scratchpad.push_str("\nObservation: ");
        scratchpad.push_str(&observation);
        scratchpad.push_str("\nThought: ");
        last_observation = Some(observation);
    }

    debug!(
        max_iterations = settings.max_iterations,
        "reasoning loop stopped at its round budget"
    );
    Ok(LoopOutcome {
        end: LoopEnd::Aborted { last_observation },
        evidence,
        rounds: settings.max_iterations,
    })
}
