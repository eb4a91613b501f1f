//! YAML extraction utilities for parsing LLM responses.
//!
//! Generators and correctors are asked to answer with a fenced
//! ```` ```yaml ```` block. These helpers pull the workflow out of the reply
//! and flag replies that do not follow the expected shape.
//!
//! # Example
//!
//! ```
//! use ci_forge::utils::yaml_extraction::extract_yaml;
//!
//! let reply = "Here you go:\n```yaml\nname: CI\non: push\n```\n";
//! assert_eq!(extract_yaml(reply).as_deref(), Some("name: CI\non: push"));
//! assert!(extract_yaml("no block here").is_none());
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// Replies longer than this are treated as runaway generations.
pub const MAX_RESPONSE_CHARS: usize = 20_000;

fn yaml_block_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```yaml\n([\s\S]*?)\n```").ok())
        .as_ref()
}

/// Extract the first ```` ```yaml ```` fenced block from an LLM reply.
pub fn extract_yaml(text: &str) -> Option<String> {
    let re = yaml_block_regex()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns true if a raw reply does not look like a fenced workflow answer.
///
/// A reply is invalid when it exceeds [`MAX_RESPONSE_CHARS`] or when no
/// content precedes a closing fence.
pub fn detect_invalid_format(response: &str) -> bool {
    if response.chars().count() > MAX_RESPONSE_CHARS {
        return true;
    }
    match response.trim().rfind("```") {
        Some(idx) => response.trim()[..idx].is_empty(),
        None => true,
    }
}

/// Truncate a string to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}
