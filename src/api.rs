use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::Config;

#[derive(Debug, Deserialize, Clone)]
struct Response {
    // Note: some compatible providers leave this out
    id: Option<String>,
    model: Option<String>,

    choices: Vec<Choice>,

    // Usage data is always returned for non-streaming.
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize, Clone)]
struct Choice {
    // Depends on the model. Ex: 'stop' | 'length' | 'content_filter' | 'tool_calls'
    finish_reason: Option<String>,
    message: Message,
}

#[derive(Debug, Deserialize, Clone)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct ErrorResponse {
    message: String,

    // "invalid_request_error", "insufficient_quota", ...
    r#type: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct ErrorResponseContainer {
    error: ErrorResponse,
}

#[derive(Debug, Deserialize, Clone)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// A remote service that turns one system instruction plus one user message
/// into one complete answer.
#[async_trait]
pub trait CompletionService {
    async fn complete(&self, system: &str, user_message: &str) -> Result<String>;
}

/// `ApiClient` talks to an OpenAI compatible chat-completion endpoint.
///
/// The credential arrives through `Config` when the client is built; the
/// client itself never reads the environment. Each call is a single
/// non-streaming POST with no retries.
pub struct ApiClient {
    config: Config,
    client: Client,
}

impl ApiClient {
    pub fn new(config: Config) -> Self {
        ApiClient {
            config,
            client: Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.api)
    }

    /// Constructs the JSON request body: the model, a system turn carrying
    /// the tutor instructions and a single user turn. Streaming is always off.
    fn build_request_body(&self, system: &str, user_message: &str) -> serde_json::Value {
        json!({
            "model": self.config.model_id,
            "messages": [
                {
                    "role": "system",
                    "content": system,
                },
                {
                    "role": "user",
                    "content": user_message,
                },
            ],
            "stream": false,
        })
    }
}

#[async_trait]
impl CompletionService for ApiClient {
    async fn complete(&self, system: &str, user_message: &str) -> Result<String> {
        let body = self.build_request_body(system, user_message);

        info!("Making chat completion call to {}", self.config.model_id);
        let response = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        parse_completion(status, &response_text)
    }
}

/// Turns the HTTP status and body of a completion call into the trimmed
/// answer text, or a descriptive error.
fn parse_completion(status: StatusCode, response_text: &str) -> Result<String> {
    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorResponseContainer>(response_text) {
            Ok(container) => anyhow!(
                "API request failed with status {}: {}",
                status,
                container.error.message
            ),
            Err(_) => {
                debug!("Raw error body: {}", response_text);
                anyhow!(
                    "API request failed with status {}: {}",
                    status,
                    body_excerpt(response_text)
                )
            }
        });
    }

    match serde_json::from_str::<Response>(response_text) {
        Ok(api_result) => {
            debug!(
                "completion {} answered by {}",
                api_result.id.as_deref().unwrap_or("<no id>"),
                api_result.model.as_deref().unwrap_or("<unknown model>")
            );
            if let Some(usage) = &api_result.usage {
                debug!(
                    "usage: {} prompt + {} completion = {} tokens",
                    usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                );
            }
            let choice = api_result
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("API response contained no choices"))?;
            debug!("finish reason: {:?}", choice.finish_reason);
            let content = choice
                .message
                .content
                .ok_or_else(|| anyhow!("API response message had no content"))?;
            Ok(content.trim().to_string())
        }
        Err(e) => match serde_json::from_str::<ErrorResponseContainer>(response_text) {
            Ok(container) => Err(anyhow!(
                "API request failed ({}): {}",
                container.error.r#type.as_deref().unwrap_or("unknown"),
                container.error.message
            )),
            Err(_) => {
                debug!("Raw JSON: {}", response_text);
                Err(anyhow!(
                    "Failed to parse JSON: {} (body: {})",
                    e,
                    body_excerpt(response_text)
                ))
            }
        },
    }
}

const EXCERPT_CHARS: usize = 200;

/// Collapses a response body onto one line and cuts it short, so it can be
/// part of the single error line written to stdout.
fn body_excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > EXCERPT_CHARS {
        format!("{}...", flat.chars().take(EXCERPT_CHARS).collect::<String>())
    } else {
        flat
    }
}
