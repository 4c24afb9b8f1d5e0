use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BackendError, ChatBackend, ChatOptions, ChatReply};

/// Chat backend speaking the Ollama `/api/generate` protocol,
/// non-streaming: one JSON request, one JSON response.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    model: Option<String>,
    done_reason: Option<String>,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        options: &ChatOptions,
    ) -> Result<ChatReply, BackendError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                num_predict: options.num_predict,
                temperature: options.temperature,
                top_p: options.top_p,
            },
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "LLM request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(Duration::from_secs(options.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::LlmTimeout(options.timeout_secs)
                } else {
                    BackendError::LlmUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::LlmModelMissing(self.model.clone()));
        }
        if status.is_server_error() {
            return Err(BackendError::LlmUnavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::LlmBadResponse(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::LlmBadResponse(e.to_string()))?;

        let text = parsed
            .response
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                BackendError::LlmBadResponse("missing or empty response field".to_string())
            })?;

        Ok(ChatReply {
            text,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            finish_reason: parsed.done_reason,
        })
    }

    async fn check_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
