//! State carried through one correction run.

use serde::{Deserialize, Serialize};

use crate::lint::{ValidationReport, VulnerabilityFinding};
use crate::workflow::WorkflowYaml;

/// Phases of the correction pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Generated,
    SyntaxFixing,
    IntentFixing,
    VulnerabilityFixing,
    Done,
}

impl Phase {
    /// The phase that follows this one. `Done` is terminal.
    pub fn next(self) -> Phase {
        match self {
            Phase::Generated => Phase::SyntaxFixing,
            Phase::SyntaxFixing => Phase::IntentFixing,
            Phase::IntentFixing => Phase::VulnerabilityFixing,
            Phase::VulnerabilityFixing | Phase::Done => Phase::Done,
        }
    }

    /// Whether this phase runs a detector/corrector loop.
    pub fn is_fixing(self) -> bool {
        matches!(
            self,
            Phase::SyntaxFixing | Phase::IntentFixing | Phase::VulnerabilityFixing
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Generated => "generated",
            Phase::SyntaxFixing => "syntax_fixing",
            Phase::IntentFixing => "intent_fixing",
            Phase::VulnerabilityFixing => "vulnerability_fixing",
            Phase::Done => "done",
        }
    }
}

/// Independent retry counters, one per fixing phase.
///
/// Counters only ever decrease and stop at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudget {
    syntax: u32,
    intent: u32,
    vulnerability: u32,
}

impl RetryBudget {
    /// Same budget for every phase.
    pub fn new(per_phase: u32) -> Self {
        Self {
            syntax: per_phase,
            intent: per_phase,
            vulnerability: per_phase,
        }
    }

    pub fn with_phase(mut self, phase: Phase, retries: u32) -> Self {
        if let Some(counter) = self.counter_mut(phase) {
            *counter = retries;
        }
        self
    }

    fn counter_mut(&mut self, phase: Phase) -> Option<&mut u32> {
        match phase {
            Phase::SyntaxFixing => Some(&mut self.syntax),
            Phase::IntentFixing => Some(&mut self.intent),
            Phase::VulnerabilityFixing => Some(&mut self.vulnerability),
            Phase::Generated | Phase::Done => None,
        }
    }

    /// Retries left for `phase`; zero for non-fixing phases.
    pub fn remaining(&self, phase: Phase) -> u32 {
        match phase {
            Phase::SyntaxFixing => self.syntax,
            Phase::IntentFixing => self.intent,
            Phase::VulnerabilityFixing => self.vulnerability,
            Phase::Generated | Phase::Done => 0,
        }
    }

    /// Spend one retry of `phase`. Returns false if none was left.
    pub fn consume(&mut self, phase: Phase) -> bool {
        match self.counter_mut(phase) {
            Some(counter) if *counter > 0 => {
                *counter -= 1;
                true
            }
            _ => false,
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(super::DEFAULT_RETRIES)
    }
}

/// Everything one correction run knows about its document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// The original request.
    pub prompt: String,
    /// Current document; `None` when nothing could be extracted yet.
    pub workflow: Option<WorkflowYaml>,
    /// Raw text of the last completion received.
    pub llm_response: Option<String>,
    pub static_check: Option<ValidationReport>,
    pub vulnerabilities: Option<Vec<VulnerabilityFinding>>,
    pub judgement: Option<String>,
    pub judge_score: Option<f64>,
    pub budget: RetryBudget,
}

impl PipelineState {
    pub fn new(prompt: impl Into<String>, budget: RetryBudget) -> Self {
        Self {
            prompt: prompt.into(),
            workflow: None,
            llm_response: None,
            static_check: None,
            vulnerabilities: None,
            judgement: None,
            judge_score: None,
            budget,
        }
    }

    pub fn workflow_str(&self) -> Option<&str> {
        self.workflow.as_ref().map(WorkflowYaml::as_str)
    }

    /// Take a corrector's candidate; an absent candidate keeps the previous document.
    pub fn accept_candidate(&mut self, candidate: Option<WorkflowYaml>) -> bool {
        match candidate {
            Some(workflow) => {
                self.workflow = Some(workflow);
                true
            }
            None => false,
        }
    }
}
