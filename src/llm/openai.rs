//! OpenAI-compatible chat completions backend
//!
//! Works against any provider exposing `POST {base_url}/v1/chat/completions`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;

use super::client::{Completion, GenerationClient, LlmError, TokenUsage};

/// Default public endpoint
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Client for a remote completion API
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new completion client
    ///
    /// # Arguments
    /// * `base_url` - API root without the `/v1` suffix
    /// * `api_key` - Bearer token
    /// * `model` - Model name (e.g., "gpt-3.5-turbo-0125")
    /// * `temperature` - Initial sampling temperature
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client reading the key from `api_key_env`
    pub fn from_env(
        base_url: impl Into<String>,
        api_key_env: &str,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, LlmError> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| LlmError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self::new(base_url, api_key, model, temperature))
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
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
        let endpoint = format!("{}/v1/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: role,
        });
        messages.extend(history.iter().map(|turn| ChatMessage {
            role: turn.role.as_api_str(),
            content: &turn.text,
        }));

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::EmptyResponse(self.model.clone()))?;

        let usage = match parsed.usage {
            Some(u) => TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            },
            None => TokenUsage::estimate(role, history, &text),
        };

        Ok(Completion { text, usage })
    }
}
