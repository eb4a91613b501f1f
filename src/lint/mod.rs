//! Validation gateway over the syntax checker and vulnerability scanner.
//!
//! The gateway gives the rest of the crate one uniform entry point for both
//! external tools and owns the handling of absent documents:
//!
//! - `check_syntax(None)` yields an invalid report with a single `empty`
//!   diagnostic, without running the checker.
//! - `scan_vulnerabilities(None)` yields no findings, without running the
//!   scanner.
//!
//! Tool failures (spawn errors, malformed output, timeouts) surface as
//! [`LintError`] and abort the current work item.

pub mod actionlint;
mod tool;
pub mod types;
pub mod zizmor;

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LintError;
use crate::workflow::WorkflowYaml;

pub use actionlint::{Actionlint, DEFAULT_LINT_TIMEOUT};
pub use types::{
    Determinations, Diagnostic, LocationItem, Severity, ValidationReport, VulnerabilityFinding,
};
pub use zizmor::Zizmor;

/// File name shown to correctors in rendered diagnostics.
const DISPLAY_FILE: &str = "test.yml";

/// Checks a workflow document for syntax errors.
#[async_trait]
pub trait SyntaxChecker: Send + Sync {
    async fn check(&self, workflow: &WorkflowYaml) -> Result<ValidationReport, LintError>;
}

/// Scans a workflow document for security weaknesses.
#[async_trait]
pub trait VulnerabilityScanner: Send + Sync {
    async fn scan(&self, workflow: &WorkflowYaml) -> Result<Vec<VulnerabilityFinding>, LintError>;
}

/// Uniform wrapper over a [`SyntaxChecker`] and a [`VulnerabilityScanner`].
#[derive(Clone)]
pub struct ValidationGateway {
    checker: Arc<dyn SyntaxChecker>,
    scanner: Arc<dyn VulnerabilityScanner>,
}

impl ValidationGateway {
    pub fn new(checker: Arc<dyn SyntaxChecker>, scanner: Arc<dyn VulnerabilityScanner>) -> Self {
        Self { checker, scanner }
    }

    /// Gateway over the `actionlint` and `zizmor` binaries found on `PATH`.
    pub fn with_default_tools() -> Self {
        Self::new(Arc::new(Actionlint::new()), Arc::new(Zizmor::new()))
    }

    pub async fn check_syntax(
        &self,
        workflow: Option<&WorkflowYaml>,
    ) -> Result<ValidationReport, LintError> {
        match workflow {
            Some(workflow) => self.checker.check(workflow).await,
            None => Ok(ValidationReport::empty_document()),
        }
    }

    pub async fn scan_vulnerabilities(
        &self,
        workflow: Option<&WorkflowYaml>,
    ) -> Result<Vec<VulnerabilityFinding>, LintError> {
        match workflow {
            Some(workflow) => self.scanner.scan(workflow).await,
            None => Ok(Vec::new()),
        }
    }
}

impl Default for ValidationGateway {
    fn default() -> Self {
        Self::with_default_tools()
    }
}

/// Render a report as `severity: file:line:col - message` blocks.
pub fn format_diagnostics(report: &ValidationReport) -> String {
    let mut out = String::new();
    for diagnostic in &report.diagnostics {
        let _ = writeln!(
            out,
            "{}: {}:{}:{} - {}\n```{}```",
            diagnostic.severity().as_str(),
            DISPLAY_FILE,
            diagnostic.line.unwrap_or(0),
            diagnostic.column.unwrap_or(0),
            diagnostic.message,
            diagnostic.snippet.as_deref().unwrap_or(""),
        );
    }
    out
}

fn annotation_level(severity: &str) -> &'static str {
    match severity {
        "High" => "error",
        "Medium" => "warning",
        _ => "notice",
    }
}

/// Render findings as GitHub workflow annotations.
///
/// Ignored findings are skipped. Positions are converted to 1-based.
pub fn format_findings(findings: &[VulnerabilityFinding]) -> String {
    let mut out = String::new();
    for finding in findings.iter().filter(|f| !f.ignored) {
        let level = annotation_level(&finding.determinations.severity);
        match finding.primary_location() {
            Some(location) => {
                let span = &location.concrete.location;
                let detail = if location.symbolic.annotation.is_empty() {
                    String::new()
                } else {
                    format!(": {}", location.symbolic.annotation)
                };
                let _ = writeln!(
                    out,
                    "::{level} file={DISPLAY_FILE},line={},col={},endLine={},endColumn={},title={}::{}{}",
                    span.start_point.row + 1,
                    span.start_point.column + 1,
                    span.end_point.row + 1,
                    span.end_point.column + 1,
                    finding.ident,
                    finding.desc,
                    detail,
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "::{level} file={DISPLAY_FILE},title={}::{}",
                    finding.ident, finding.desc
                );
            }
        }
    }
    out
}
