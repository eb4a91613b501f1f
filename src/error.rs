//! Error types for ci-forge operations.
//!
//! Defines error types for the major subsystems:
//! - LLM API interactions
//! - Syntax checking and vulnerability scanning
//! - Judgement score extraction
//! - Dataset loading
//! - Repository tools
//! - Functional test sandboxes

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: LITELLM_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("LLM returned an empty completion")]
    EmptyResponse,

    #[error("Concurrency gate closed")]
    GateClosed,

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the external syntax checker or vulnerability scanner.
///
/// These indicate an environment problem rather than a data problem, so they
/// abort the processing of the current work item.
#[derive(Debug, Error)]
pub enum LintError {
    #[error("Failed to launch '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' produced malformed output: {message}")]
    MalformedOutput { tool: String, message: String },

    #[error("'{tool}' timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while judging a workflow.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Failed to extract score from judgement after {attempts} attempts")]
    ScoreNotFound { attempts: u32 },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Errors that can occur while building a score record.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Lint error: {0}")]
    Lint(#[from] LintError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

/// Errors that can occur while loading a dataset of work items.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    #[error("Invalid record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid prompt level {0}: must be 1, 2 or 3")]
    InvalidPromptLevel(u8),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the read-only repository tools.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path escapes the repository root: {0}")]
    OutsideRoot(String),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid action reference: {0:?}")]
    InvalidAction(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while preparing or running a functional test sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Sandbox setup failed: {0}")]
    Setup(String),

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize event payload: {0}")]
    Event(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
