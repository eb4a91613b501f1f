//! LLM integration for ci-forge.
//!
//! The generative and judging capability is reached through the
//! [`LlmProvider`] trait. All pipeline code talks to it via a
//! [`CompletionGate`], which bounds the number of in-flight requests across
//! every worker.
//!
//! ```ignore
//! use ci_forge::llm::{CompletionGate, LiteLlmClient};
//! use std::sync::Arc;
//!
//! let client = Arc::new(LiteLlmClient::from_env()?);
//! let generator = CompletionGate::new(client, "z-ai/glm-4.7-flash", 190);
//! let judge = generator.with_model("openai/gpt-oss-120b");
//! let text = judge.complete("You are a DevOps expert.", "Rate this workflow").await?;
//! ```

pub mod gate;
pub mod litellm;

pub use gate::{CompletionGate, Exchange, Transcript, DEFAULT_MAX_CONCURRENT_REQUESTS};
pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message,
    DEFAULT_MODEL, OPENROUTER_BASE_URL,
};
