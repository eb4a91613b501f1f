//! In-process stand-ins for the LLM endpoint and the external linters.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ci_forge::correction::AgentRole;
use ci_forge::lint::{
    Diagnostic, SyntaxChecker, ValidationGateway, ValidationReport, VulnerabilityFinding,
    VulnerabilityScanner,
};
use ci_forge::llm::{CompletionGate, GenerationRequest, GenerationResponse, LlmProvider};
use ci_forge::workflow::{WorkItem, WorkflowYaml};
use ci_forge::{LintError, LlmError};

pub const CLEAN_WORKFLOW: &str = "name: CI\non: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4\n      - run: cargo test";

/// Marker that makes [`MarkerChecker`] report a syntax error.
pub const SYNTAX_MARKER: &str = "broken";
/// Marker that makes [`MarkerScanner`] report a finding.
pub const VULNERABILITY_MARKER: &str = "unsafe";

pub fn fenced(workflow: &str) -> String {
    format!("Here is the workflow:\n```yaml\n{workflow}\n```\n")
}

/// Routes requests by system prompt to scripted generator, corrector and judge replies.
pub struct RoutedProvider {
    /// `None` makes the generator call fail.
    pub generator: Option<String>,
    pub corrector: String,
    pub judge: String,
    calls: Mutex<Vec<&'static str>>,
    generator_prompts: Mutex<Vec<String>>,
}

impl RoutedProvider {
    pub fn new(generator: Option<String>, corrector: impl Into<String>, judge: impl Into<String>) -> Self {
        Self {
            generator,
            corrector: corrector.into(),
            judge: judge.into(),
            calls: Mutex::new(Vec::new()),
            generator_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self, role: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| **r == role).count()
    }

    /// User prompts the generator received.
    pub fn generator_prompts(&self) -> Vec<String> {
        self.generator_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for RoutedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let system = request.messages[0].content.as_str();
        let (role, reply) = if system == AgentRole::Judge.system_prompt() {
            ("judge", Some(self.judge.clone()))
        } else if system == AgentRole::Generator.system_prompt() {
            ("generator", self.generator.clone())
        } else {
            ("corrector", Some(self.corrector.clone()))
        };
        self.calls.lock().unwrap().push(role);
        if role == "generator" {
            let prompt = request.messages.get(1).map(|m| m.content.clone()).unwrap_or_default();
            self.generator_prompts.lock().unwrap().push(prompt);
        }

        let content = reply.ok_or_else(|| LlmError::RequestFailed("endpoint offline".to_string()))?;
        Ok(GenerationResponse::from_text(request.model, content))
    }
}

/// Reports a syntax error whenever the document contains [`SYNTAX_MARKER`].
#[derive(Default)]
pub struct MarkerChecker {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SyntaxChecker for MarkerChecker {
    async fn check(&self, workflow: &WorkflowYaml) -> Result<ValidationReport, LintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let diagnostics = if workflow.as_str().contains(SYNTAX_MARKER) {
            vec![Diagnostic::new("unexpected key \"broken\"", "syntax-check").with_position(3, 1)]
        } else {
            Vec::new()
        };
        Ok(ValidationReport::from_diagnostics(diagnostics))
    }
}

/// Reports one finding whenever the document contains [`VULNERABILITY_MARKER`].
#[derive(Default)]
pub struct MarkerScanner {
    pub calls: AtomicUsize,
}

pub fn finding() -> VulnerabilityFinding {
    serde_json::from_value(serde_json::json!({
        "ident": "template-injection",
        "desc": "code injection via template expansion",
        "url": "https://docs.zizmor.sh/audits/#template-injection",
        "determinations": {"confidence": "High", "severity": "High", "persona": "Regular"},
        "locations": [],
        "ignored": false
    }))
    .unwrap()
}

#[async_trait]
impl VulnerabilityScanner for MarkerScanner {
    async fn scan(&self, workflow: &WorkflowYaml) -> Result<Vec<VulnerabilityFinding>, LintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if workflow.as_str().contains(VULNERABILITY_MARKER) {
            Ok(vec![finding()])
        } else {
            Ok(Vec::new())
        }
    }
}

pub struct Harness {
    pub provider: Arc<RoutedProvider>,
    pub checker: Arc<MarkerChecker>,
    pub scanner: Arc<MarkerScanner>,
    pub gate: CompletionGate,
    pub gateway: ValidationGateway,
}

impl Harness {
    pub fn new(provider: RoutedProvider) -> Self {
        let provider = Arc::new(provider);
        let checker = Arc::new(MarkerChecker::default());
        let scanner = Arc::new(MarkerScanner::default());
        let gate = CompletionGate::new(provider.clone(), "test-model", 4);
        let gateway = ValidationGateway::new(checker.clone(), scanner.clone());
        Self {
            provider,
            checker,
            scanner,
            gate,
            gateway,
        }
    }

    pub fn checker_calls(&self) -> usize {
        self.checker.calls.load(Ordering::SeqCst)
    }

    pub fn scanner_calls(&self) -> usize {
        self.scanner.calls.load(Ordering::SeqCst)
    }
}

pub fn work_item(id: u64, repository: &str) -> WorkItem {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "repository_name": repository,
        "repository_owner": "octo",
        "file_name": "ci.yml",
        "file_content": CLEAN_WORKFLOW,
        "workflow": CLEAN_WORKFLOW,
        "triggers": ["push"],
        "nb_triggers": 1,
        "nb_jobs": 1,
        "actions": ["actions/checkout@v4"],
        "nb_reusable_workflows": 0,
        "nb_steps": 2,
        "cyclomatic_complexity": 1,
        "prompt_level1": "Build and test the crate on push.",
        "prompt_level2": "Run cargo test on ubuntu-latest for every push.",
        "prompt_level3": "On push, check out the code and run cargo test on ubuntu-latest."
    }))
    .unwrap()
}
