//! Pipeline configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default completion model for every role.
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
/// Default planner max tokens.
const DEFAULT_PLANNER_MAX_TOKENS: u32 = 1024;
/// Default specialist max tokens per reasoning round.
const DEFAULT_SPECIALIST_MAX_TOKENS: u32 = 1024;
/// Default synthesizer max tokens.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 2048;
/// Default per-call timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Default intent-gate confidence threshold (strictly greater than).
pub const DEFAULT_GATE_THRESHOLD: f32 = 60.0;
/// Default specialist reasoning-round bound.
pub const DEFAULT_MAX_ITERATIONS: usize = 2;
/// Default number of passages per retrieval call.
const DEFAULT_RETRIEVAL_TOP_K: usize = 3;
/// Default fallback specialist.
pub const DEFAULT_SPECIALIST: &str = "GENERAL";
/// Default number of specialists run concurrently for one request.
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Configuration for the routing pipeline.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Completion provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (any OpenAI-compatible endpoint).
    pub base_url: Option<String>,
    /// Model for the routing planner.
    pub planner_model: String,
    /// Model for specialist reasoning rounds.
    pub specialist_model: String,
    /// Model for the synthesizer.
    pub synthesizer_model: String,
    /// Model for the completion-backed intent classifier.
    pub classifier_model: String,
    /// Maximum tokens for planner responses.
    pub planner_max_tokens: u32,
    /// Maximum tokens for one specialist reasoning round.
    pub specialist_max_tokens: u32,
    /// Maximum tokens for synthesizer responses.
    pub synthesizer_max_tokens: u32,
    /// Time budget for every single provider call.
    pub timeout: Duration,
    /// Confidence (0–100) a gated label must exceed to short-circuit.
    pub gate_threshold: f32,
    /// Reasoning rounds a specialist may take before aborting.
    pub max_iterations: usize,
    /// Passages returned per retrieval call.
    pub retrieval_top_k: usize,
    /// Specialist that receives the whole query when planning fails.
    pub default_specialist: String,
    /// Maximum specialists executed concurrently for one request.
    ///
    /// `1` runs plan steps strictly one after another.
    pub max_concurrency: usize,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
    /// Endpoint of an HTTP short-text classifier. When unset, the
    /// classifier falls back to a completion call.
    pub classifier_url: Option<String>,
    /// JSON Lines corpus backing the retrieval tool.
    pub corpus_path: Option<PathBuf>,
    /// `SQLite` database backing the structured-query tools.
    pub database_path: Option<PathBuf>,
    /// JSON file describing the specialist registry.
    pub specialists_file: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    planner_model: Option<String>,
    specialist_model: Option<String>,
    synthesizer_model: Option<String>,
    classifier_model: Option<String>,
    planner_max_tokens: Option<u32>,
    specialist_max_tokens: Option<u32>,
    synthesizer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    gate_threshold: Option<f32>,
    max_iterations: Option<usize>,
    retrieval_top_k: Option<usize>,
    default_specialist: Option<String>,
    max_concurrency: Option<usize>,
    prompt_dir: Option<PathBuf>,
    classifier_url: Option<String>,
    corpus_path: Option<PathBuf>,
    database_path: Option<PathBuf>,
    specialists_file: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("UNIROUTE_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("UNIROUTE_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("UNIROUTE_BASE_URL")
                .or_else(|_| std::env::var("OPENAI_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("UNIROUTE_MODEL").ok();
        }
        if self.planner_model.is_none() {
            self.planner_model = std::env::var("UNIROUTE_PLANNER_MODEL").ok();
        }
        if self.specialist_model.is_none() {
            self.specialist_model = std::env::var("UNIROUTE_SPECIALIST_MODEL").ok();
        }
        if self.synthesizer_model.is_none() {
            self.synthesizer_model = std::env::var("UNIROUTE_SYNTHESIZER_MODEL").ok();
        }
        if self.classifier_model.is_none() {
            self.classifier_model = std::env::var("UNIROUTE_CLASSIFIER_MODEL").ok();
        }
        if self.timeout.is_none() {
            self.timeout = env_parse::<u64>("UNIROUTE_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.gate_threshold.is_none() {
            self.gate_threshold = env_parse("UNIROUTE_GATE_THRESHOLD");
        }
        if self.max_iterations.is_none() {
            self.max_iterations = env_parse("UNIROUTE_MAX_ITERATIONS");
        }
        if self.retrieval_top_k.is_none() {
            self.retrieval_top_k = env_parse("UNIROUTE_TOP_K");
        }
        if self.default_specialist.is_none() {
            self.default_specialist = std::env::var("UNIROUTE_DEFAULT_SPECIALIST").ok();
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parse("UNIROUTE_MAX_CONCURRENCY");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("UNIROUTE_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.classifier_url.is_none() {
            self.classifier_url = std::env::var("UNIROUTE_CLASSIFIER_URL").ok();
        }
        if self.corpus_path.is_none() {
            self.corpus_path = std::env::var("UNIROUTE_CORPUS").ok().map(PathBuf::from);
        }
        if self.database_path.is_none() {
            self.database_path = std::env::var("UNIROUTE_DATABASE").ok().map(PathBuf::from);
        }
        if self.specialists_file.is_none() {
            self.specialists_file = std::env::var("UNIROUTE_SPECIALISTS").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the completion provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets one model for every role that has no role-specific model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the planner model.
    #[must_use]
    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    /// Sets the specialist model.
    #[must_use]
    pub fn specialist_model(mut self, model: impl Into<String>) -> Self {
        self.specialist_model = Some(model.into());
        self
    }

    /// Sets the synthesizer model.
    #[must_use]
    pub fn synthesizer_model(mut self, model: impl Into<String>) -> Self {
        self.synthesizer_model = Some(model.into());
        self
    }

    /// Sets the classifier model.
    #[must_use]
    pub fn classifier_model(mut self, model: impl Into<String>) -> Self {
        self.classifier_model = Some(model.into());
        self
    }

    /// Sets the synthesizer max tokens.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the intent-gate confidence threshold.
    #[must_use]
    pub const fn gate_threshold(mut self, threshold: f32) -> Self {
        self.gate_threshold = Some(threshold);
        self
    }

    /// Sets the specialist reasoning-round bound.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the number of passages per retrieval call.
    #[must_use]
    pub const fn retrieval_top_k(mut self, n: usize) -> Self {
        self.retrieval_top_k = Some(n);
        self
    }

    /// Sets the fallback specialist.
    #[must_use]
    pub fn default_specialist(mut self, id: impl Into<String>) -> Self {
        self.default_specialist = Some(id.into());
        self
    }

    /// Sets the fan-out width.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the HTTP classifier endpoint.
    #[must_use]
    pub fn classifier_url(mut self, url: impl Into<String>) -> Self {
        self.classifier_url = Some(url.into());
        self
    }

    /// Sets the retrieval corpus path.
    #[must_use]
    pub fn corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = Some(path.into());
        self
    }

    /// Sets the structured-query database path.
    #[must_use]
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the specialist registry file.
    #[must_use]
    pub fn specialists_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.specialists_file = Some(path.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, and
    /// [`AgentError::Configuration`] for out-of-range values.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let gate_threshold = self.gate_threshold.unwrap_or(DEFAULT_GATE_THRESHOLD);
        if !(0.0..=100.0).contains(&gate_threshold) {
            return Err(AgentError::config(format!(
                "gate threshold must be within 0-100, got {gate_threshold}"
            )));
        }
        let max_iterations = self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            return Err(AgentError::config("max iterations must be at least 1"));
        }
        let max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if max_concurrency == 0 {
            return Err(AgentError::config("max concurrency must be at least 1"));
        }

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            planner_model: self.planner_model.unwrap_or_else(|| model.clone()),
            specialist_model: self.specialist_model.unwrap_or_else(|| model.clone()),
            synthesizer_model: self.synthesizer_model.unwrap_or_else(|| model.clone()),
            classifier_model: self.classifier_model.unwrap_or(model),
            planner_max_tokens: self
                .planner_max_tokens
                .unwrap_or(DEFAULT_PLANNER_MAX_TOKENS),
            specialist_max_tokens: self
                .specialist_max_tokens
                .unwrap_or(DEFAULT_SPECIALIST_MAX_TOKENS),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            gate_threshold,
            max_iterations,
            retrieval_top_k: self.retrieval_top_k.unwrap_or(DEFAULT_RETRIEVAL_TOP_K).max(1),
            default_specialist: self
                .default_specialist
                .unwrap_or_else(|| DEFAULT_SPECIALIST.to_string()),
            max_concurrency,
            prompt_dir: self.prompt_dir,
            classifier_url: self.classifier_url,
            corpus_path: self.corpus_path,
            database_path: self.database_path,
            specialists_file: self.specialists_file,
        })
    }
}
