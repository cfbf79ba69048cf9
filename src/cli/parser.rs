//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// uniroute: university question router.
///
/// Gates each question by intent, plans which specialists should answer
/// it, runs them against the document corpus and the student database,
/// and merges their answers.
#[derive(Parser, Debug)]
#[command(name = "uniroute")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output and debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Data sources and tuning shared by the pipeline commands.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// JSON Lines document corpus for the search tool.
    #[arg(long, env = "UNIROUTE_CORPUS")]
    pub corpus: Option<PathBuf>,

    /// `SQLite` database for the structured-query tools.
    #[arg(long, env = "UNIROUTE_DATABASE")]
    pub database: Option<PathBuf>,

    /// JSON file describing the specialists.
    #[arg(long, env = "UNIROUTE_SPECIALISTS")]
    pub specialists: Option<PathBuf>,

    /// Directory containing prompt template files.
    #[arg(long, env = "UNIROUTE_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,

    /// Model used for every role.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Run plan steps one after another.
    #[arg(long)]
    pub sequential: bool,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer one question through the full pipeline.
    #[command(after_help = r#"Examples:
  uniroute ask "What is the GPA of student 522001?" --database uni.db
  uniroute ask "When is tuition due?" --corpus docs.jsonl
  uniroute --format json ask "Dormitory fees?" | jq '.trace.steps'
  OPENAI_API_KEY=sk-... UNIROUTE_BASE_URL=https://api.groq.com/openai/v1 uniroute ask "Hi"
"#)]
    Ask {
        /// The question to answer.
        question: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Answer questions read from stdin, one per line (`exit` quits).
    Chat {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Show the routing plan for a question without running it.
    Plan {
        /// The question to plan.
        question: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// List the configured specialists.
    Specialists {
        /// JSON file describing the specialists.
        #[arg(long, env = "UNIROUTE_SPECIALISTS")]
        specialists: Option<PathBuf>,
    },

    /// Write the default prompt templates for customization.
    #[command(after_help = r#"Examples:
  uniroute init-prompts                    # ~/.config/uniroute/prompts
  uniroute init-prompts --dir ./prompts    # custom directory
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}
