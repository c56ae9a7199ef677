//! Hosted inference endpoint backend
//!
//! These endpoints take a single `inputs` string rather than a chat, so the
//! history is joined with spaces and the role instruction is not sent.

use async_trait::async_trait;
use serde::Deserialize;

use crate::conversation::Turn;

use super::client::{Completion, GenerationClient, LlmError, TokenUsage};

/// Default hosted inference API root
pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

/// The endpoint answers with either a list or a single object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<Generated>),
    Single(Generated),
}

#[derive(Debug, Deserialize)]
struct Generated {
    #[serde(default)]
    generated_text: Option<String>,
}

/// Client for `POST {base_url}/models/{model}`
#[derive(Clone)]
pub struct InferenceClient {
    base_url: String,
    api_token: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl InferenceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            model: model.into(),
            temperature,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client reading the token from `api_key_env`
    pub fn from_env(
        base_url: impl Into<String>,
        api_key_env: &str,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, LlmError> {
        let token = std::env::var(api_key_env)
            .map_err(|_| LlmError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self::new(base_url, token, model, temperature))
    }
}

#[async_trait]
impl GenerationClient for InferenceClient {
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
        let endpoint = format!("{}/models/{}", self.base_url, self.model);
        let inputs = history
            .iter()
            .map(|turn| turn.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut body = serde_json::json!({ "inputs": inputs });
        if self.temperature > 0.0 {
            body["parameters"] = serde_json::json!({ "temperature": self.temperature });
        }

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let generated = match serde_json::from_str::<InferenceResponse>(&text)? {
            InferenceResponse::Batch(items) => items.into_iter().next().and_then(|g| g.generated_text),
            InferenceResponse::Single(item) => item.generated_text,
        };
        let generated = generated.ok_or_else(|| LlmError::EmptyResponse(self.model.clone()))?;

        let usage = TokenUsage::estimate(role, history, &generated);
        Ok(Completion {
            text: generated,
            usage,
        })
    }
}
