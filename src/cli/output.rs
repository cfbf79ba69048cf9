//! Output formatting for CLI commands.
//!
//! Text output is meant for people; JSON and NDJSON are meant for scripts
//! and carry the full serialized values.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::finding::{QueryResult, RoutingPlan};
use crate::agent::registry::SpecialistProfile;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name, defaulting to text for anything unknown.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format's JSON flavor.
    ///
    /// Serialization of the crate's own types cannot fail; a failure
    /// yields an error object instead of a panic.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Formats a pipeline result.
#[must_use]
pub fn format_query_result(result: &QueryResult, format: OutputFormat, verbose: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => {
            let mut out = format.to_json(result);
            out.push('\n');
            out
        }
        OutputFormat::Text => {
            let trace = &result.trace;
            let mut out = result.answer.trim_end().to_string();
            out.push_str("\n\n---\n");

            let route = if trace.short_circuited {
                "intent gate".to_string()
            } else if trace.steps.is_empty() {
                "none".to_string()
            } else {
                trace
                    .steps
                    .iter()
                    .map(|s| {
                        let agent = if s.agent.is_empty() { "<none>" } else { s.agent.as_str() };
                        match s.status {
                            Some(status) => format!("{agent} ({status})"),
                            None => format!("{agent} (skipped)"),
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = write!(out, "Route: {route}");
            if trace.used_fallback_plan {
                out.push_str(" [fallback plan]");
            }
            if let Some(ref c) = trace.classification {
                let _ = write!(out, " | Intent: {} ({:.1}%)", c.label, c.confidence);
            }
            let _ = writeln!(
                out,
                " | Evidence: {} | Time: {:.1}s",
                result.evidence.len(),
                result.elapsed.as_secs_f64()
            );

            if verbose {
                for step in &trace.steps {
                    let _ = writeln!(out, "  {} <- {}", step.agent, step.sub_query);
                }
                for (idx, passage) in result.evidence.iter().enumerate() {
                    let _ = writeln!(out, "[{}] {}", idx + 1, truncate(passage, 200));
                }
            }
            out
        }
    }
}

/// Formats a routing plan.
#[must_use]
pub fn format_plan(plan: &RoutingPlan, used_fallback: bool, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => {
            let value = serde_json::json!({
                "plan": plan.steps,
                "fallback": used_fallback,
            });
            let mut out = format.to_json(&value);
            out.push('\n');
            out
        }
        OutputFormat::Text => {
            let mut out = String::new();
            if used_fallback {
                out.push_str("Planner output unusable, fallback plan:\n");
            }
            for (idx, step) in plan.steps.iter().enumerate() {
                let _ = writeln!(out, "{}. {} <- {}", idx + 1, step.agent, step.query);
            }
            out
        }
    }
}

/// Formats the specialist catalog.
#[must_use]
pub fn format_profiles(profiles: &[SpecialistProfile], default_id: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => {
            let mut out = format.to_json(profiles);
            out.push('\n');
            out
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for profile in profiles {
                let marker = if profile.id == default_id { " (default)" } else { "" };
                let _ = writeln!(out, "{}{marker}: {}", profile.id, profile.name);
                let _ = writeln!(out, "  {}", profile.description);
                let domains = if profile.domains.is_empty() {
                    "all".to_string()
                } else {
                    profile.domains.join(", ")
                };
                let _ = writeln!(
                    out,
                    "  domains: {domains} | structured query: {}",
                    if profile.structured_query { "yes" } else { "no" }
                );
            }
            out
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
