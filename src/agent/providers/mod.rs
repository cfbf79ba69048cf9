//! Completion provider implementations.

mod openai;

pub use openai::OpenAiProvider;
