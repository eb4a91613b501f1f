//! Report types produced by the syntax checker and vulnerability scanner.
//!
//! The serialized shapes match the JSON emitted by `actionlint` and `zizmor`
//! so reports can be stored verbatim in score records.

use serde::{Deserialize, Serialize};

/// Diagnostic kind emitted when there is no document to check.
pub const EMPTY_KIND: &str = "empty";

/// Diagnostic kind that marks a hard syntax error.
pub const SYNTAX_CHECK_KIND: &str = "syntax-check";

/// Severity of a diagnostic, derived from its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A single syntax checker diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            filepath: None,
            line: None,
            column: None,
            snippet: None,
            end_column: None,
        }
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn severity(&self) -> Severity {
        if self.kind == SYNTAX_CHECK_KIND {
            Severity::Error
        } else {
            Severity::Warning
        }
    }
}

/// Outcome of a syntax check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(rename = "output", default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    /// A report is valid iff it carries no diagnostics.
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            valid: diagnostics.is_empty(),
            diagnostics,
        }
    }

    /// Report for an absent document.
    pub fn empty_document() -> Self {
        Self {
            valid: false,
            diagnostics: vec![Diagnostic::new("Workflow is empty", EMPTY_KIND)],
        }
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .count()
    }
}

/// Confidence, severity and persona assigned to a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Determinations {
    pub confidence: String,
    pub severity: String,
    pub persona: String,
}

/// Zero-based position inside the scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffsetSpan {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocationSpan {
    pub start_point: Point,
    pub end_point: Point,
    #[serde(default)]
    pub offset_span: OffsetSpan,
}

/// Where a finding sits in the workflow model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicLocation {
    #[serde(default)]
    pub key: serde_json::Value,
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub route: serde_json::Value,
    #[serde(default)]
    pub feature_kind: String,
    /// `Primary` or `Related`.
    #[serde(default)]
    pub kind: String,
}

/// Where a finding sits in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteLocation {
    pub location: LocationSpan,
    #[serde(default)]
    pub feature: String,
    #[serde(default)]
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationItem {
    pub symbolic: SymbolicLocation,
    pub concrete: ConcreteLocation,
}

impl LocationItem {
    pub fn is_primary(&self) -> bool {
        self.symbolic.kind == "Primary"
    }
}

/// A security finding reported by the vulnerability scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub ident: String,
    pub desc: String,
    #[serde(default)]
    pub url: String,
    pub determinations: Determinations,
    #[serde(default)]
    pub locations: Vec<LocationItem>,
    #[serde(default)]
    pub ignored: bool,
}

impl VulnerabilityFinding {
    /// The primary location, falling back to the first one listed.
    pub fn primary_location(&self) -> Option<&LocationItem> {
        self.locations
            .iter()
            .find(|l| l.is_primary())
            .or_else(|| self.locations.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_kind() {
        assert_eq!(
            Diagnostic::new("bad", SYNTAX_CHECK_KIND).severity(),
            Severity::Error
        );
        assert_eq!(
            Diagnostic::new("meh", "expression").severity(),
            Severity::Warning
        );
    }

    #[test]
    fn test_report_wire_shape() {
        let report = ValidationReport::from_diagnostics(vec![
            Diagnostic::new("unexpected key", SYNTAX_CHECK_KIND).with_position(3, 5),
        ]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["output"][0]["line"], 3);
        assert!(json["output"][0].get("snippet").is_none());
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_empty_document_report() {
        let report = ValidationReport::empty_document();
        assert!(!report.valid);
        assert_eq!(report.diagnostics[0].kind, EMPTY_KIND);
    }

    #[test]
    fn test_parse_actionlint_entry() {
        let raw = r#"[{"message":"key \"jobz\" is unknown","filepath":"/tmp/x.yml","line":4,"column":1,"kind":"syntax-check","snippet":"jobz:\n^~~~","end_column":4}]"#;
        let diagnostics: Vec<Diagnostic> = serde_json::from_str(raw).unwrap();
        assert_eq!(diagnostics[0].end_column, Some(4));
        assert_eq!(diagnostics[0].severity(), Severity::Error);
    }

    #[test]
    fn test_parse_zizmor_finding() {
        let raw = r#"{
            "ident": "excessive-permissions",
            "desc": "overly broad permissions",
            "url": "https://docs.zizmor.sh/audits/#excessive-permissions",
            "determinations": {"confidence": "High", "severity": "Medium", "persona": "Regular"},
            "locations": [{
                "symbolic": {"key": {"Local": {"prefix": null, "given_path": "x.yml"}},
                             "annotation": "uses write-all", "route": {"components": []},
                             "feature_kind": "Normal", "kind": "Primary"},
                "concrete": {"location": {"start_point": {"row": 2, "column": 0},
                                          "end_point": {"row": 2, "column": 21},
                                          "offset_span": {"start": 20, "end": 41}},
                             "feature": "permissions: write-all", "comments": []}
            }],
            "ignored": false
        }"#;
        let finding: VulnerabilityFinding = serde_json::from_str(raw).unwrap();
        let primary = finding.primary_location().unwrap();
        assert_eq!(primary.concrete.location.start_point.row, 2);
        assert_eq!(finding.determinations.severity, "Medium");
    }
}
