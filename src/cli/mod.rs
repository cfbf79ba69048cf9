//! CLI layer for uniroute.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, inspecting routing plans and managing prompts.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, PipelineArgs};
