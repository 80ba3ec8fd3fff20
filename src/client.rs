//! Chat-completion client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::loader::Credential;
use crate::plan::Plan;

/// One completion request: the route's prompt plus fixed framing and
/// sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// A request carrying `prompt` with the plan's model settings and the
    /// profile's system framing.
    pub fn new(plan: &Plan, prompt: String) -> Self {
        Self {
            system: plan.profile.system_prompt().to_string(),
            prompt,
            model: plan.model.name.clone(),
            max_tokens: plan.max_tokens(),
            temperature: plan.model.temperature,
        }
    }
}

/// Something that turns a prompt into completion text.
///
/// Implementations make exactly one attempt per call and report every
/// failure through the returned `Result`.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, Error>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Credential,
}

impl OpenAiClient {
    pub fn new(endpoint: &str, credential: Credential) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http_client(http, endpoint, credential))
    }

    /// Use an already configured HTTP client (proxy or TLS settings).
    pub fn with_http_client(http: reqwest::Client, endpoint: &str, credential: Credential) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, Error> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(self.credential.expose())
            .json(&ChatRequest::from(request))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status,
                message: api_error_message(&body),
            });
        }

        extract_completion(&body)
    }

    fn backend_name(&self) -> &'static str {
        "openai"
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a CompletionRequest> for ChatRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
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
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Pull the first choice's text out of a response body, trimmed.
///
/// Missing, null or whitespace-only content is [`Error::Empty`].
fn extract_completion(body: &[u8]) -> Result<String, Error> {
    let response: ChatResponse = serde_json::from_slice(body)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(Error::Empty)?;
    Ok(text)
}

/// The API's own error message if the body carries one, else the raw body.
fn api_error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => {
            let raw = String::from_utf8_lossy(body);
            let raw = raw.trim();
            if raw.chars().count() > 200 {
                format!("{}...", raw.chars().take(200).collect::<String>())
            } else {
                raw.to_string()
            }
        }
    }
}

/// Errors from a completion attempt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("malformed completion response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("completion response contained no text")]
    Empty,
}
