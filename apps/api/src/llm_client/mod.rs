//! Anthropic Messages client behind the `CompletionProvider` seam.
//!
//! Generators only ever see `CompletionProvider::complete`; the HTTP details,
//! retry schedule and response shape stay in this module.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Pinned so suggestion quality does not shift under a deploy.
pub const MODEL: &str = "claude-sonnet-4-5";
/// A field-level edit list is short; this leaves room for a long experience entry.
const MAX_TOKENS: u32 = 2048;
/// Low so that two runs over the same field propose the same edits.
const TEMPERATURE: f32 = 0.2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM still failing after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Anything that turns a prompt into raw completion text.
/// The seam between suggestion generation and the network.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

/// How often, and how patiently, a failed call is repeated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before `attempt` (0-based); doubles each time, none before the first.
    fn delay_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            n => self.base_delay * 2u32.saturating_pow(n - 1),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl MessagesResponse {
    fn into_text(self) -> Option<String> {
        self.content.into_iter().find_map(|block| match block {
            Block::Text { text } if !text.trim().is_empty() => Some(text),
            _ => None,
        })
    }
}

/// What one HTTP round trip means for the retry loop.
enum Outcome {
    Done(String),
    Retry(LlmError),
    Fail(LlmError),
}

/// Sorts a non-success response: rate limits and server errors are worth another
/// attempt, anything else is the caller's fault and final.
fn classify_failure(status: StatusCode, body: String) -> Outcome {
    let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    let error = LlmError::Api {
        status: status.as_u16(),
        message,
    };
    if retryable {
        Outcome::Retry(error)
    } else {
        Outcome::Fail(error)
    }
}

/// Anthropic Messages API client used by the AI suggestion generator.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            retry: RetryPolicy::default(),
        })
    }

    async fn attempt(&self, request: &MessagesRequest<'_>) -> Outcome {
        let sent = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(e) => return Outcome::Retry(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return classify_failure(status, body);
        }

        let parsed: MessagesResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return Outcome::Fail(e.into()),
        };
        if let Some(usage) = &parsed.usage {
            debug!(
                "LLM call used {} input / {} output tokens",
                usage.input_tokens, usage.output_tokens
            );
        }
        match parsed.into_text() {
            Some(text) => Outcome::Done(text),
            None => Outcome::Fail(LlmError::EmptyContent),
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system,
            messages: [UserTurn {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error = None;
        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                warn!("Retrying LLM call in {}ms (attempt {})", delay.as_millis(), attempt + 1);
                tokio::time::sleep(delay).await;
            }
            match self.attempt(&request).await {
                Outcome::Done(text) => return Ok(text),
                Outcome::Fail(e) => return Err(e),
                Outcome::Retry(e) => {
                    warn!("LLM call failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::Exhausted {
            attempts: self.retry.max_attempts,
        }))
    }
}

/// Strips a ```json or bare ``` fence from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(body) = ["```json", "```"]
        .into_iter()
        .find_map(|fence| text.strip_prefix(fence))
    else {
        return text;
    };
    let body = body.trim_start();
    body.strip_suffix("```").map(str::trim).unwrap_or(body)
}
