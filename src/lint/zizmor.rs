//! `zizmor` vulnerability scanner.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::actionlint::DEFAULT_LINT_TIMEOUT;
use super::tool::{run_tool, write_temp_workflow};
use super::types::VulnerabilityFinding;
use super::VulnerabilityScanner;
use crate::error::LintError;
use crate::workflow::WorkflowYaml;

/// Parse the `--format=json` output of zizmor. Empty output means no findings.
pub fn parse_zizmor_output(stdout: &str) -> Result<Vec<VulnerabilityFinding>, LintError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|e| LintError::MalformedOutput {
        tool: "zizmor".to_string(),
        message: e.to_string(),
    })
}

/// Vulnerability scanner backed by the `zizmor` binary.
#[derive(Debug, Clone)]
pub struct Zizmor {
    program: PathBuf,
    timeout: Duration,
}

impl Zizmor {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("zizmor"),
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

impl Default for Zizmor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VulnerabilityScanner for Zizmor {
    async fn scan(&self, workflow: &WorkflowYaml) -> Result<Vec<VulnerabilityFinding>, LintError> {
        let file = write_temp_workflow(workflow.as_str())?;
        // zizmor exits non-zero whenever it reports findings
        let (exit_code, stdout, stderr) =
            run_tool(&self.program, &["--format=json"], file.path(), self.timeout).await?;

        parse_zizmor_output(&stdout).map_err(|err| {
            tracing::warn!(exit_code, stderr = %stderr.trim(), "zizmor output not parseable");
            err
        })
    }
}
