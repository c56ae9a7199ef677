//! Harness configuration
//!
//! Loaded from YAML when a file is given, otherwise built from defaults; the
//! CLI overrides individual fields afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::controller::RepairConfig;
use crate::llm::inference::DEFAULT_INFERENCE_URL;
use crate::llm::ollama::DEFAULT_OLLAMA_URL;
use crate::llm::openai::DEFAULT_OPENAI_BASE_URL;
use crate::llm::{Backend, BackendKind, InferenceClient, LlmError, OllamaClient, OpenAiClient};
use crate::verifier::{SolverProcess, DEFAULT_SOLVER_BINARY};

/// Error type for configuration problems
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Failed to build backend: {0}")]
    Backend(#[from] LlmError),
}

/// Which generation backend and model an agent uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub backend: BackendKind,
    pub model: String,
    /// Overrides the backend's default endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ModelConfig {
    pub fn remote(model: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::RemoteCompletion,
            model: model.into(),
            base_url: None,
            api_key_env: None,
        }
    }

    fn key_env(&self) -> &str {
        match (&self.api_key_env, self.backend) {
            (Some(env), _) => env.as_str(),
            (None, BackendKind::RemoteInference) => "HUGGING_FACE_TOK",
            (None, _) => "OPENAI_API_KEY",
        }
    }

    /// Build the backend this entry describes
    pub fn build(&self, temperature: f32) -> Result<Backend, LlmError> {
        let backend = match self.backend {
            BackendKind::RemoteCompletion => {
                let url = self.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL);
                Backend::RemoteCompletion(OpenAiClient::from_env(
                    url,
                    self.key_env(),
                    &self.model,
                    temperature,
                )?)
            }
            BackendKind::LocalModel => {
                let url = self.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
                Backend::LocalModel(OllamaClient::new(url, &self.model, temperature))
            }
            BackendKind::RemoteInference => {
                let url = self.base_url.as_deref().unwrap_or(DEFAULT_INFERENCE_URL);
                Backend::RemoteInference(InferenceClient::from_env(
                    url,
                    self.key_env(),
                    &self.model,
                    temperature,
                )?)
            }
        };
        Ok(backend)
    }
}

/// How puzzles are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Encode as SMT-LIB and repair against the solver
    Smt,
    /// Solve in natural language, no solver
    Direct,
}

/// Everything a batch run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub solver: ModelConfig,
    pub grader: ModelConfig,
    /// Model for hint generation; falls back to the solver model
    pub decomposer: Option<ModelConfig>,
    pub use_decomposer: bool,
    pub repair: RepairConfig,
    pub mode: Mode,
    pub puzzles_dir: PathBuf,
    /// Result CSV; a timestamped name is used when unset
    pub output_csv: Option<PathBuf>,
    pub usage_ledger: PathBuf,
    pub solver_binary: PathBuf,
    pub solver_args: Vec<String>,
    pub solver_timeout_secs: Option<u64>,
    pub transcripts_dir: Option<PathBuf>,
    pub metrics_out: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            solver: ModelConfig::remote("gpt-3.5-turbo-0125"),
            grader: ModelConfig::remote("gpt-4o-2024-05-13"),
            decomposer: None,
            use_decomposer: false,
            repair: RepairConfig::default(),
            mode: Mode::Smt,
            puzzles_dir: PathBuf::from("./data/puzzles"),
            output_csv: None,
            usage_ledger: PathBuf::from("tokens_count.csv"),
            solver_binary: PathBuf::from(DEFAULT_SOLVER_BINARY),
            solver_args: Vec::new(),
            solver_timeout_secs: None,
            transcripts_dir: None,
            metrics_out: None,
        }
    }
}

impl HarnessConfig {
    /// Load from a YAML file; missing fields take their defaults
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.repair.validate()?;
        if self.solver.model.trim().is_empty() || self.grader.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model names must not be empty".into()));
        }
        Ok(())
    }

    /// Output path, defaulting to a timestamped log name
    pub fn output_path(&self) -> PathBuf {
        self.output_csv.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "LLM_log_{}.csv",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ))
        })
    }

    /// Decomposer model, if hints are enabled
    pub fn decomposer_model(&self) -> Option<&ModelConfig> {
        if !self.use_decomposer {
            return None;
        }
        Some(self.decomposer.as_ref().unwrap_or(&self.solver))
    }

    pub fn verifier(&self) -> SolverProcess {
        SolverProcess::new(&self.solver_binary)
            .with_args(self.solver_args.clone())
            .with_timeout(self.solver_timeout_secs.map(std::time::Duration::from_secs))
    }
}
