//! Shared utility functions for ci-forge.
//!
//! This module provides helpers used across multiple modules, including
//! workflow extraction from LLM responses.

pub mod yaml_extraction;

pub use yaml_extraction::{detect_invalid_format, extract_yaml, truncate, MAX_RESPONSE_CHARS};
