//! Concurrency-limited completion gate.
//!
//! Every call to the generative/judging endpoint goes through a
//! [`CompletionGate`]. Gates derived with [`CompletionGate::with_model`] share
//! one semaphore, so the global limit holds across all agents and workers
//! regardless of the worker-pool size. Callers block while no permit is free.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Semaphore;

use super::litellm::{GenerationRequest, LlmProvider, Message};
use crate::error::LlmError;

/// Default number of in-flight completion requests.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 190;

/// Attempts made when the endpoint answers with empty content.
const EMPTY_RESPONSE_ATTEMPTS: u32 = 2;

/// One prompt and its reply (or failure) as seen by a gate.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receives every exchange made through a gate it is attached to.
#[async_trait]
pub trait Transcript: Send + Sync {
    async fn record_exchange(&self, exchange: &Exchange<'_>);
}

/// A single-operation view over an [`LlmProvider`]: `complete(system, prompt) -> text`.
#[derive(Clone)]
pub struct CompletionGate {
    provider: Arc<dyn LlmProvider>,
    model: String,
    semaphore: Arc<Semaphore>,
    transcript: Option<Arc<dyn Transcript>>,
}

impl CompletionGate {
    /// Create a gate with its own semaphore of `max_concurrent` permits.
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            transcript: None,
        }
    }

    /// Derive a gate targeting another model that shares this gate's permits.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            model: model.into(),
            semaphore: Arc::clone(&self.semaphore),
            transcript: self.transcript.clone(),
        }
    }

    /// Derive a gate that also hands every exchange to `transcript`.
    pub fn with_transcript(&self, transcript: Arc<dyn Transcript>) -> Self {
        Self {
            transcript: Some(transcript),
            ..self.clone()
        }
    }

    /// Model this gate sends requests to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of permits currently free.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Send one system + user exchange and return the completion text.
    ///
    /// An empty completion is retried once before surfacing
    /// [`LlmError::EmptyResponse`]. The exchange is recorded in the attached
    /// transcript, if any, after the permit is released.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let result = self.request(system, prompt).await;
        if let Some(transcript) = &self.transcript {
            let exchange = Exchange {
                model: &self.model,
                system,
                prompt,
                response: result.as_deref().ok(),
                error: result.as_ref().err().map(ToString::to_string),
            };
            transcript.record_exchange(&exchange).await;
        }
        result
    }

    async fn request(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| LlmError::GateClosed)?;

        for attempt in 1..=EMPTY_RESPONSE_ATTEMPTS {
            let request = GenerationRequest::new(
                self.model.clone(),
                vec![Message::system(system), Message::user(prompt)],
            );
            let response = self.provider.generate(request).await?;
            match response.first_content() {
                Some(content) if !content.trim().is_empty() => return Ok(content.to_string()),
                _ => {
                    tracing::debug!(
                        model = %self.model,
                        attempt,
                        finish_reason = ?response.first_finish_reason(),
                        "Empty completion received"
                    );
                }
            }
        }

        Err(LlmError::EmptyResponse)
    }
}
