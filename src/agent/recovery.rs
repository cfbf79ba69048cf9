//! Salvaging answers from model output the reasoning loop cannot parse.
//!
//! Rules are applied in order and the first match wins. The chain never
//! calls a provider again: malformed output is resolved deterministically.

use std::fmt;

use tracing::debug;

use super::finding::{AgentResponse, ResponseStatus};

/// Marker that introduces a declared answer.
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
/// Marker after which trailing executor noise is cut off.
const ERROR_ENCOUNTERED_MARKER: &str = "Error encountered:";
/// Prefix of the parse-failure message produced by the action parser.
pub const PARSE_FAILURE_MARKER: &str = "Could not parse LLM output";
/// Characters of raw text kept by the generic error rule.
const RAW_PREVIEW_CHARS: usize = 200;
/// Line prefixes dropped when cleaning a parse-failure message.
const REASONING_PREFIXES: [&str; 4] = ["Action:", "Thought:", "Action Input:", "Observation:"];

/// Which rule produced a [`Recovery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryRule {
    /// Text after the last final-answer marker.
    FinalAnswer,
    /// Text carries a tuple-list literal.
    StructuredData,
    /// Parse-failure message with reasoning lines removed.
    ParseFailure,
    /// Nothing usable; a truncated preview is surfaced as an error.
    Unrecoverable,
}

impl fmt::Display for RecoveryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FinalAnswer => "final_answer",
            Self::StructuredData => "structured_data",
            Self::ParseFailure => "parse_failure",
            Self::Unrecoverable => "unrecoverable",
        })
    }
}

/// Result of applying the recovery chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    /// Recovered response text.
    pub text: String,
    /// `ParseRecovered`, or `Error` for the last rule.
    pub status: ResponseStatus,
    /// The rule that matched.
    pub rule: RecoveryRule,
}

impl Recovery {
    /// Converts into a specialist response carrying `evidence`.
    #[must_use]
    pub fn into_response(self, evidence: Vec<String>) -> AgentResponse {
        AgentResponse {
            text: self.text,
            evidence,
            status: self.status,
        }
    }
}

/// Applies the recovery rules to unparsable model output.
#[must_use]
pub fn recover_output(raw: &str) -> Recovery {
    let recovery = if let Some(idx) = raw.rfind(FINAL_ANSWER_MARKER) {
        let answer = raw[idx + FINAL_ANSWER_MARKER.len()..].trim();
        let answer = answer
            .split(ERROR_ENCOUNTERED_MARKER)
            .next()
            .unwrap_or(answer)
            .trim();
        Recovery {
            text: answer.to_string(),
            status: ResponseStatus::ParseRecovered,
            rule: RecoveryRule::FinalAnswer,
        }
    } else if raw.contains("[(") && raw.contains(")]") {
        Recovery {
            text: format!("Found data: {raw}"),
            status: ResponseStatus::ParseRecovered,
            rule: RecoveryRule::StructuredData,
        }
    } else if raw.contains(PARSE_FAILURE_MARKER) {
        let content = raw
            .replace(&format!("{PARSE_FAILURE_MARKER}: `"), "")
            .replace('`', "");
        let kept: Vec<&str> = content
            .split('\n')
            .filter(|line| {
                let line = line.trim();
                !REASONING_PREFIXES.iter().any(|p| line.starts_with(p))
            })
            .collect();
        Recovery {
            text: kept.join("\n").trim().to_string(),
            status: ResponseStatus::ParseRecovered,
            rule: RecoveryRule::ParseFailure,
        }
    } else {
        let preview: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
        Recovery {
            text: format!("Error: {preview}"),
            status: ResponseStatus::Error,
            rule: RecoveryRule::Unrecoverable,
        }
    };

    debug!(rule = %recovery.rule, status = %recovery.status, "recovered unparsable output");
    recovery
}
