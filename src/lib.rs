//! ci-forge: generation and evaluation of GitHub Actions workflows.
//!
//! This library generates workflows from natural-language prompts, repairs
//! them through syntax, intent and vulnerability correction phases, runs them
//! in an `act` sandbox and scores them against ground-truth workflows.

// Core modules
pub mod batch;
pub mod cli;
pub mod correction;
pub mod difficulty;
pub mod error;
pub mod lint;
pub mod llm;
pub mod sandbox;
pub mod scoring;
pub mod tools;
pub mod utils;
pub mod workflow;

// Re-export commonly used error types
pub use error::{
    DatasetError, JudgeError, LintError, LlmError, SandboxError, ScoreError, ToolError,
};
