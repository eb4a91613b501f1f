//! Chat-completion client for OpenAI-compatible endpoints (LiteLLM proxies,
//! OpenRouter) used to generate, judge and correct workflows.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default OpenRouter API endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model used when neither the request nor the client names one.
pub const DEFAULT_MODEL: &str = "z-ai/glm-4.7-flash";

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl Message {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }
}

/// A chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Empty means the client default.
    pub model: String,
    pub messages: Vec<Message>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// Completion choices returned for a request.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub model: String,
    pub choices: Vec<Choice>,
}

/// One returned completion.
#[derive(Debug, Clone)]
pub struct Choice {
    pub message: Message,
    /// e.g. "stop" or "length".
    pub finish_reason: Option<String>,
}

impl GenerationResponse {
    /// Single assistant reply, finished with "stop".
    pub fn from_text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            choices: vec![Choice {
                message: Message::assistant(content),
                finish_reason: Some("stop".to_string()),
            }],
        }
    }

    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }

    pub fn first_finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

/// A backend able to answer chat completion requests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Client for LiteLLM-compatible APIs.
pub struct LiteLlmClient {
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    http_client: Client,
}

impl LiteLlmClient {
    pub fn new(api_base: String, api_key: Option<String>, default_model: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self {
            api_base,
            api_key,
            default_model,
            http_client,
        }
    }

    /// Client for OpenRouter with the default model.
    pub fn new_with_defaults(api_key: String) -> Self {
        Self::new(
            OPENROUTER_BASE_URL.to_string(),
            Some(api_key),
            DEFAULT_MODEL.to_string(),
        )
    }

    /// Client configured by `LITELLM_API_BASE` (required), `LITELLM_API_KEY`
    /// and `LITELLM_DEFAULT_MODEL`.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("LITELLM_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("LITELLM_API_KEY").ok();
        let default_model =
            env::var("LITELLM_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_base, api_key, default_model))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Reasoning models may return `null` content.
#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl From<ApiResponse> for GenerationResponse {
    fn from(response: ApiResponse) -> Self {
        let choices = response
            .choices
            .into_iter()
            .map(|choice| Choice {
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason,
            })
            .collect();
        Self {
            model: response.model,
            choices,
        }
    }
}

/// Map a non-success reply to an error, preferring the API's own message.
fn api_error(status: u16, body: String) -> LlmError {
    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(parsed) if status == 429 => LlmError::RateLimited(parsed.error.message),
        Ok(parsed) => LlmError::ApiError {
            code: status,
            message: parsed.error.message,
        },
        Err(_) => LlmError::ApiError {
            code: status,
            message: body,
        },
    }
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, mut request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        if request.model.is_empty() {
            request.model = self.default_model.clone();
        }

        let url = format!("{}/chat/completions", self.api_base);
        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Title", "ci-forge");
        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
        }

        let http_response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(api_error(status.as_u16(), body));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {e}")))?;
        Ok(api_response.into())
    }
}
