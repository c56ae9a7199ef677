//! Text-generation backends
//!
//! Every backend implements [`GenerationClient`]; configuration picks one
//! [`Backend`] variant per agent.
//!
//! - `openai` - remote chat completions API
//! - `ollama` - locally hosted model via Ollama
//! - `inference` - hosted inference endpoint with a single text input
//! - `usage` - explicit token-usage accumulator

pub mod client;
pub mod inference;
pub mod ollama;
pub mod openai;
pub mod usage;

pub use client::{Backend, BackendKind, Completion, GenerationClient, LlmError, TokenUsage};
pub use inference::InferenceClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use usage::UsageLedger;
