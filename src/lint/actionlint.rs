//! `actionlint` syntax checker.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::tool::{run_tool, write_temp_workflow};
use super::types::{Diagnostic, ValidationReport};
use super::SyntaxChecker;
use crate::error::LintError;
use crate::workflow::WorkflowYaml;

/// Default per-invocation timeout of the linters.
pub const DEFAULT_LINT_TIMEOUT: Duration = Duration::from_secs(60);

/// YAML 1.1 dumpers turn the `on:` key into `true:`; undo that before linting.
pub fn repair_on_key(content: &str) -> String {
    content.replace("\ntrue", "\non")
}

/// Parse the `{{json .}}` output of actionlint.
pub fn parse_actionlint_output(stdout: &str) -> Result<Vec<Diagnostic>, LintError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|e| LintError::MalformedOutput {
        tool: "actionlint".to_string(),
        message: e.to_string(),
    })
}

/// Syntax checker backed by the `actionlint` binary.
#[derive(Debug, Clone)]
pub struct Actionlint {
    program: PathBuf,
    timeout: Duration,
}

impl Actionlint {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("actionlint"),
            timeout: DEFAULT_LINT_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for Actionlint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyntaxChecker for Actionlint {
    async fn check(&self, workflow: &WorkflowYaml) -> Result<ValidationReport, LintError> {
        let file = write_temp_workflow(&repair_on_key(workflow.as_str()))?;
        let (exit_code, stdout, stderr) = run_tool(
            &self.program,
            &["-ignore", "action is too old", "-format", "{{json .}}"],
            file.path(),
            self.timeout,
        )
        .await?;

        let diagnostics = parse_actionlint_output(&stdout).map_err(|err| {
            tracing::warn!(exit_code, stderr = %stderr.trim(), "actionlint output not parseable");
            err
        })?;
        Ok(ValidationReport::from_diagnostics(diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_on_key() {
        let dumped = "name: CI\ntrue:\n  push: {}\n";
        assert_eq!(repair_on_key(dumped), "name: CI\non:\n  push: {}\n");
    }

    #[test]
    fn test_parse_empty_output_is_valid() {
        assert!(parse_actionlint_output("[]\n").unwrap().is_empty());
        assert!(parse_actionlint_output("").unwrap().is_empty());
        assert!(parse_actionlint_output("null").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_output() {
        let err = parse_actionlint_output("could not read file").unwrap_err();
        assert!(matches!(err, LintError::MalformedOutput { .. }));
    }

    #[test]
    fn test_parse_diagnostics() {
        let raw = r#"[{"message":"m","kind":"expression","line":2,"column":7}]"#;
        let diagnostics = parse_actionlint_output(raw).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].column, Some(7));
    }
}
