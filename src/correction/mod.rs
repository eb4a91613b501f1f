//! Iterative correction of generated workflows.
//!
//! A generated document passes through three fixing phases, each with its own
//! retry budget:
//!
//! 1. **Syntax**: corrected while the syntax checker reports problems.
//! 2. **Intent**: corrected while the judge's score is below 5.
//! 3. **Vulnerability**: corrected while the scanner reports findings.
//!
//! Later phases always run, even when an earlier one exhausted its budget.

pub mod agents;
pub mod machine;
pub mod pipeline;
pub mod state;
pub mod storyline;

pub use agents::{AgentRole, PromptVars};
pub use machine::{transition, Detection, Step};
pub use pipeline::{CorrectionOutcome, CorrectionPipeline, CorrectionSummary};
pub use state::{Phase, PipelineState, RetryBudget};
pub use storyline::Storyline;

use crate::llm::DEFAULT_MODEL;

/// Retries granted to each fixing phase.
pub const DEFAULT_RETRIES: u32 = 5;

/// Model used by the judge.
pub const DEFAULT_JUDGE_MODEL: &str = "openai/gpt-oss-120b";

/// Configuration of a [`CorrectionPipeline`].
#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    /// Retry budget of each phase.
    pub retries: u32,
    /// Model used by the generator and the correctors.
    pub generator_model: String,
    pub judge_model: String,
    /// Enrich the generator prompt with repository context.
    pub repository_context: bool,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            generator_model: DEFAULT_MODEL.to_string(),
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            repository_context: true,
        }
    }
}

impl CorrectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_generator_model(mut self, model: impl Into<String>) -> Self {
        self.generator_model = model.into();
        self
    }

    pub fn with_judge_model(mut self, model: impl Into<String>) -> Self {
        self.judge_model = model.into();
        self
    }

    pub fn with_repository_context(mut self, enabled: bool) -> Self {
        self.repository_context = enabled;
        self
    }

    /// Upper bound on corrector invocations in one run.
    pub fn max_corrector_invocations(&self) -> u32 {
        self.retries.saturating_mul(3)
    }
}
