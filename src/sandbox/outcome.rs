//! Functional test outcomes and job-result parsing.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Result of one functional test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// `dryrun_success && execution_success`.
    pub success: bool,
    pub dryrun_success: bool,
    pub execution_success: bool,
    pub output: String,
    pub errors: String,
    pub skipped_jobs: Vec<String>,
    pub jobs_executed: Vec<String>,
    pub jobs_failed: Vec<String>,
}

impl TestOutcome {
    /// Outcome for a run that never got past the dry run.
    pub fn dry_run_failed(output: impl Into<String>, errors: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            errors: errors.into(),
            ..Self::default()
        }
    }

    /// Outcome for a run that could not be attempted at all.
    pub fn failed(errors: impl Into<String>) -> Self {
        Self::dry_run_failed(String::new(), errors)
    }
}

/// Classifies jobs from runner output.
pub trait JobOutcomeParser: Send + Sync {
    /// Returns `(executed, failed)` job names.
    fn parse(&self, output: &str) -> (Vec<String>, Vec<String>);
}

/// Parser for the log format of `act`.
///
/// Jobs marked `✓`/`SUCCESS` are executed and `✗`/`FAIL`/`ERROR` failed.
/// Without any marker, every distinct `[workflow/job]` prefix counts as
/// executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActLogParser;

struct ActPatterns {
    success: Regex,
    failure: Regex,
    job_prefix: Regex,
}

fn act_patterns() -> Option<&'static ActPatterns> {
    static PATTERNS: OnceLock<Option<ActPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(ActPatterns {
                success: Regex::new(r"\[.*?\]\s*(?:✓|SUCCESS)\s+(\S+)").ok()?,
                failure: Regex::new(r"\[.*?\]\s*(?:✗|FAIL|ERROR)\s+(\S+)").ok()?,
                job_prefix: Regex::new(r"\[.*?/(\w+)\]\s+").ok()?,
            })
        })
        .as_ref()
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

impl JobOutcomeParser for ActLogParser {
    fn parse(&self, output: &str) -> (Vec<String>, Vec<String>) {
        let Some(patterns) = act_patterns() else {
            return (Vec::new(), Vec::new());
        };

        let executed = captures(&patterns.success, output);
        let failed = captures(&patterns.failure, output);
        if !executed.is_empty() || !failed.is_empty() {
            return (executed, failed);
        }

        let mut jobs: Vec<String> = Vec::new();
        for job in captures(&patterns.job_prefix, output) {
            if !jobs.contains(&job) {
                jobs.push(job);
            }
        }
        (jobs, Vec::new())
    }
}
