//! Azure OpenAI chat completions client.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

use super::{parse_json_payload, Completion, CompletionRequest, LanguageModel};
use crate::config::AzureOpenAiConfig;
use crate::error::{Error, Result};

const CONTENT_FILTER: &str = "content_filter";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

/// Vision-capable chat model deployed on Azure OpenAI.
pub struct AzureOpenAi {
    config: AzureOpenAiConfig,
    client: Client,
}

impl AzureOpenAi {
    /// Create a client.
    pub fn new(config: AzureOpenAiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(AzureOpenAiConfig::from_env()?)
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        let mut user_parts = vec![json!({ "type": "text", "text": request.user })];
        user_parts.extend(request.images.iter().map(|image| {
            json!({
                "type": "image_url",
                "image_url": { "url": image.to_data_url() }
            })
        }));

        json!({
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": user_parts }
            ],
            "temperature": self.config.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                    "strict": false
                }
            }
        })
    }

    fn send_once(&self, body: &Value) -> Result<Completion> {
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;

        if status.is_success() {
            let chat: ChatResponse = serde_json::from_str(&text)?;
            let choice = chat
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| Error::Llm("Response has no choices".into()))?;
            if choice.finish_reason.as_deref() == Some(CONTENT_FILTER) {
                return Ok(Completion::ContentFiltered {
                    reason: "completion stopped by content filter".into(),
                });
            }
            let content = choice
                .message
                .content
                .ok_or_else(|| Error::Llm("Response message has no content".into()))?;
            return parse_json_payload(&content).map(Completion::Json);
        }

        let api_error = serde_json::from_str::<ErrorEnvelope>(&text).ok();
        if status == StatusCode::BAD_REQUEST {
            if let Some(ErrorEnvelope { error }) = &api_error {
                if error.code.as_deref() == Some(CONTENT_FILTER) {
                    return Ok(Completion::ContentFiltered {
                        reason: error.message.clone(),
                    });
                }
            }
        }

        let message = api_error.map(|e| e.error.message).unwrap_or(text);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(Error::ServiceUnavailable {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(Error::Llm(format!("{}: {}", status, message)))
        }
    }
}

impl LanguageModel for AzureOpenAi {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = self.body(request);
        let mut attempt = 1;
        loop {
            match self.send_once(&body) {
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = Duration::from_secs(2 * attempt as u64);
                    log::warn!(
                        "LLM request '{}' failed (attempt {}/{}): {}; retrying in {:?}",
                        request.schema_name,
                        attempt,
                        self.config.max_attempts,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
