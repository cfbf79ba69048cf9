//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands return their
//! output as a string; only `chat` writes to stdout while it runs.

use std::future::Future;
use std::io::{self, BufRead, Write as IoWrite};
use std::path::Path;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::agent::config::{AgentConfig, DEFAULT_SPECIALIST};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::agent::registry::{default_profiles, load_profiles, normalize_id};
use crate::cli::output::{OutputFormat, format_plan, format_profiles, format_query_result};
use crate::cli::parser::{Cli, Commands, PipelineArgs};
use crate::error::{AgentError, CommandError, Result};

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a data source cannot be
/// loaded, or the request is interrupted.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask { question, pipeline } => cmd_ask(question, pipeline, format, cli.verbose),
        Commands::Chat { pipeline } => cmd_chat(pipeline, format, cli.verbose),
        Commands::Plan { question, pipeline } => cmd_plan(question, pipeline, format),
        Commands::Specialists { specialists } => cmd_specialists(specialists.as_deref(), format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds pipeline configuration from the environment and CLI overrides.
fn build_config(pipeline: &PipelineArgs) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(ref path) = pipeline.corpus {
        builder = builder.corpus_path(path);
    }
    if let Some(ref path) = pipeline.database {
        builder = builder.database_path(path);
    }
    if let Some(ref path) = pipeline.specialists {
        builder = builder.specialists_file(path);
    }
    if let Some(ref dir) = pipeline.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(ref model) = pipeline.model {
        builder = builder
            .planner_model(model)
            .specialist_model(model)
            .synthesizer_model(model)
            .classifier_model(model);
    }
    if pipeline.sequential {
        builder = builder.max_concurrency(1);
    }

    Ok(builder.build()?)
}

fn runtime() -> Result<Runtime> {
    Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Runs one request, cancelling its token on Ctrl-C.
///
/// The interrupt listener lives only as long as the request; nothing is
/// left running on the runtime afterwards.
async fn interruptible<T, F, Fut>(work: F) -> std::result::Result<T, AgentError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = std::result::Result<T, AgentError>>,
{
    let token = CancellationToken::new();
    let request = work(token.clone());
    tokio::pin!(request);
    tokio::select! {
        biased;
        result = &mut request => return result,
        Ok(()) = tokio::signal::ctrl_c() => token.cancel(),
    }
    request.await
}

fn cmd_ask(
    question: &str,
    pipeline: &PipelineArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<String> {
    let config = build_config(pipeline)?;
    let orchestrator = Orchestrator::from_config(&config)?;
    let rt = runtime()?;

    let result = rt.block_on(interruptible(|token| async move {
        orchestrator.run_cancellable(question, &token).await
    }))?;

    Ok(format_query_result(&result, format, verbose))
}

fn cmd_chat(pipeline: &PipelineArgs, format: OutputFormat, verbose: bool) -> Result<String> {
    let config = build_config(pipeline)?;
    let orchestrator = Orchestrator::from_config(&config)?;
    let rt = runtime()?;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    if format == OutputFormat::Text {
        writeln!(
            stdout,
            "uniroute ready with {} specialists. Type 'exit' to quit.",
            orchestrator.registry().len()
        )?;
    }

    let mut answered = 0usize;
    for line in stdin.lock().lines() {
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let orchestrator = &orchestrator;
        let outcome = rt.block_on(interruptible(|token| async move {
            orchestrator.run_cancellable(question, &token).await
        }));
        match outcome {
            Ok(result) => {
                write!(stdout, "{}", format_query_result(&result, format, verbose))?;
                answered += 1;
            }
            Err(AgentError::Cancelled) => {
                writeln!(stdout, "(cancelled)")?;
            }
            Err(e) => return Err(e.into()),
        }
        stdout.flush()?;
    }

    if format == OutputFormat::Text {
        Ok(format!("Answered {answered} question(s).\n"))
    } else {
        Ok(String::new())
    }
}

fn cmd_plan(question: &str, pipeline: &PipelineArgs, format: OutputFormat) -> Result<String> {
    let config = build_config(pipeline)?;
    let orchestrator = Orchestrator::from_config(&config)?;
    let rt = runtime()?;

    let (plan, used_fallback) = rt.block_on(orchestrator.plan_only(question))?;
    Ok(format_plan(&plan, used_fallback, format))
}

fn cmd_specialists(path: Option<&Path>, format: OutputFormat) -> Result<String> {
    let profiles = match path {
        Some(path) => load_profiles(path)?,
        None => default_profiles(),
    };
    let default_id = std::env::var("UNIROUTE_DEFAULT_SPECIALIST")
        .map_or_else(|_| DEFAULT_SPECIALIST.to_string(), |id| normalize_id(&id));
    Ok(format_profiles(&profiles, &default_id, format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");
                output.push_str("  ");
                output.push_str(name);
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the classifier, planner, specialist and synthesizer prompts.\n");
            Ok(output)
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            let mut out = format.to_json(&json);
            out.push('\n');
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cmd_init_prompts_writes_once() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let out = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.starts_with("Wrote 4 prompt template(s)"));
        assert!(dir.path().join("planner.md").exists());

        let again = cmd_init_prompts(Some(dir.path()), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value =
            serde_json::from_str(&again).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["count"], 0);
    }

    #[test]
    fn test_cmd_specialists_from_file() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("specialists.json");
        std::fs::write(
            &path,
            r#"[{"id": "library", "name": "Library", "description": "Opening hours and loans"}]"#,
        )
        .unwrap_or_else(|_| unreachable!());
        let out = cmd_specialists(Some(&path), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.contains("LIBRARY: Library"));
        assert!(out.contains("Opening hours and loans"));
    }

    #[test]
    fn test_interruptible_leaves_no_tasks_behind() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|_| unreachable!());
        for round in 0..20 {
            let value = rt
                .block_on(interruptible(|token| async move {
                    assert!(!token.is_cancelled());
                    Ok(round)
                }))
                .unwrap_or_else(|_| unreachable!());
            assert_eq!(value, round);
        }
        assert_eq!(rt.metrics().num_alive_tasks(), 0);
    }

    #[test]
    fn test_cmd_specialists_invalid_file() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("specialists.json");
        std::fs::write(&path, "not json").unwrap_or_else(|_| unreachable!());
        assert!(cmd_specialists(Some(&path), OutputFormat::Text).is_err());
    }
}
