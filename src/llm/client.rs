//! The generation capability shared by every backend
//!
//! Agents only ever see [`GenerationClient`]. The concrete backend is chosen
//! once, at configuration time, as a [`Backend`] variant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;

use super::inference::InferenceClient;
use super::ollama::OllamaClient;
use super::openai::OpenAiClient;

/// Token counts for a single generation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Rough count for backends that do not report usage (~4 chars per token)
    pub fn estimate(role: &str, history: &[Turn], response: &str) -> Self {
        let sent: usize = role.len() + history.iter().map(|t| t.text.len()).sum::<usize>();
        Self {
            prompt_tokens: estimate_tokens(sent),
            completion_tokens: estimate_tokens(response.len()),
        }
    }
}

fn estimate_tokens(chars: usize) -> u64 {
    chars.div_ceil(4) as u64
}

/// One generated response plus what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Error type for generation calls
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Empty response from {0}")]
    EmptyResponse(String),
    #[error("Missing API key: set {0}")]
    MissingApiKey(String),
}

impl LlmError {
    /// Errors that will not go away by asking again
    pub fn is_fatal(&self) -> bool {
        match self {
            LlmError::MissingApiKey(_) => true,
            LlmError::Status { status, .. } => matches!(status, 401 | 403 | 404),
            _ => false,
        }
    }
}

/// Uniform text-generation capability
///
/// `history` alternates user/agent turns starting with a user turn; `role` is
/// the system-level instruction. Temperature changes only affect later calls.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Model identifier, used as the usage-ledger key
    fn model(&self) -> &str;

    fn temperature(&self) -> f32;

    fn set_temperature(&mut self, temperature: f32);

    async fn respond(&self, role: &str, history: &[Turn]) -> Result<Completion, LlmError>;
}

/// Backend kinds selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions API
    RemoteCompletion,
    /// Locally hosted model served by Ollama
    LocalModel,
    /// Hosted inference endpoint taking a single `inputs` string
    RemoteInference,
}

/// Closed set of generation backends
#[derive(Clone)]
pub enum Backend {
    RemoteCompletion(OpenAiClient),
    LocalModel(OllamaClient),
    RemoteInference(InferenceClient),
}

#[async_trait]
impl GenerationClient for Backend {
    fn model(&self) -> &str {
        match self {
            Backend::RemoteCompletion(c) => c.model(),
            Backend::LocalModel(c) => c.model(),
            Backend::RemoteInference(c) => c.model(),
        }
    }

    fn temperature(&self) -> f32 {
        match self {
            Backend::RemoteCompletion(c) => c.temperature(),
            Backend::LocalModel(c) => c.temperature(),
            Backend::RemoteInference(c) => c.temperature(),
        }
    }

    fn set_temperature(&mut self, temperature: f32) {
        match self {
            Backend::RemoteCompletion(c) => c.set_temperature(temperature),
            Backend::LocalModel(c) => c.set_temperature(temperature),
            Backend::RemoteInference(c) => c.set_temperature(temperature),
        }
    }

    async fn respond(&self, role: &str, history: &[Turn]) -> Result<Completion, LlmError> {
        match self {
            Backend::RemoteCompletion(c) => c.respond(role, history).await,
            Backend::LocalModel(c) => c.respond(role, history).await,
            Backend::RemoteInference(c) => c.respond(role, history).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LlmError::MissingApiKey("OPENAI_API_KEY".into()).is_fatal());
        assert!(LlmError::Status { status: 401, body: String::new() }.is_fatal());
        assert!(LlmError::Status { status: 404, body: String::new() }.is_fatal());
        assert!(!LlmError::Status { status: 503, body: String::new() }.is_fatal());
        assert!(!LlmError::EmptyResponse("ollama".into()).is_fatal());
    }

    #[test]
    fn test_usage_estimate() {
        let history = vec![Turn::user("abcdefgh")];
        let usage = TokenUsage::estimate("abcd", &history, "abcde");
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 2);
    }
}
