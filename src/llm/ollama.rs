//! Ollama chat backend for locally hosted models
//!
//! Talks to Ollama's `/api/chat` endpoint with streaming disabled, so each
//! call returns one complete message plus token counts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;

use super::client::{Completion, GenerationClient, LlmError, TokenUsage};

/// Default local Ollama server
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A message in an Ollama chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn from_turn(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_api_str().to_string(),
            content: turn.text.clone(),
        }
    }
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
}

/// Client for Ollama's /api/chat endpoint
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    /// * `model` - The model name (e.g., "llama3")
    /// * `temperature` - Initial sampling temperature
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    async fn respond(&self, role: &str, history: &[Turn]) -> Result<Completion, LlmError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(history.len() + 1);
        if !role.is_empty() {
            messages.push(ChatMessage::system(role));
        }
        messages.extend(history.iter().map(ChatMessage::from_turn));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": self.temperature
            }
        });

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.is_empty() {
            return Err(LlmError::EmptyResponse(self.model.clone()));
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)?;
        let content = chat_response.message.content;

        // Older Ollama builds omit the counters
        let usage = if chat_response.prompt_eval_count == 0 && chat_response.eval_count == 0 {
            TokenUsage::estimate(role, history, &content)
        } else {
            TokenUsage {
                prompt_tokens: chat_response.prompt_eval_count,
                completion_tokens: chat_response.eval_count,
            }
        };

        Ok(Completion {
            text: content,
            usage,
        })
    }
}
