//! The correction pipeline driver.
//!
//! One run generates a workflow from a prompt and then walks the syntax,
//! intent and vulnerability phases in order. Each phase detects, and while a
//! problem is outstanding and its budget allows, asks a corrector for a new
//! candidate and detects again. Phase changes are decided by
//! [`transition`](super::machine::transition).

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::agents::{generator_prompt, AgentRole, PromptVars};
use super::machine::{transition, Detection, Step};
use super::state::{Phase, PipelineState, RetryBudget};
use super::storyline::Storyline;
use super::CorrectionConfig;
use crate::error::{JudgeError, LintError};
use crate::lint::{format_diagnostics, format_findings, ValidationGateway};
use crate::llm::{CompletionGate, Transcript};
use crate::scoring::judge::run_judgement;
use crate::tools::RepoTools;
use crate::utils::{detect_invalid_format, extract_yaml};
use crate::workflow::WorkflowYaml;

/// Retries consumed and calls made during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionSummary {
    pub syntax_retries_used: u32,
    pub intent_retries_used: u32,
    pub vulnerability_retries_used: u32,
    pub corrector_invocations: u32,
    pub judge_invocations: u32,
    /// The initial generation call itself failed.
    pub generation_failed: bool,
}

/// Result of a correction run.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub state: PipelineState,
    /// Raw reply of the initial generation call.
    pub generation_response: Option<String>,
    /// Whether that reply was malformed.
    pub invalid_format: bool,
    pub summary: CorrectionSummary,
}

impl CorrectionOutcome {
    /// The document the vulnerability phase ended with.
    pub fn final_workflow(&self) -> Option<&WorkflowYaml> {
        self.state.workflow.as_ref()
    }
}

/// Drives the generate → syntax → intent → vulnerability sequence.
#[derive(Clone)]
pub struct CorrectionPipeline {
    generator: CompletionGate,
    judge: CompletionGate,
    gateway: ValidationGateway,
    config: CorrectionConfig,
}

impl CorrectionPipeline {
    /// Build a pipeline; generator and judge gates share `gate`'s permits.
    pub fn new(gate: &CompletionGate, gateway: ValidationGateway, config: CorrectionConfig) -> Self {
        Self {
            generator: gate.with_model(config.generator_model.clone()),
            judge: gate.with_model(config.judge_model.clone()),
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Run the full pipeline for `prompt`.
    ///
    /// `repo_root` scopes the repository tools used to enrich the generator
    /// prompt. Only syntax checker or scanner failures are returned as
    /// errors; completion failures degrade the run instead. Every completion
    /// exchange is written to the storyline's messages file.
    pub async fn run(
        &self,
        prompt: &str,
        repo_root: Option<&Path>,
        storyline: &Storyline,
    ) -> Result<CorrectionOutcome, LintError> {
        self.traced(storyline).drive(prompt, repo_root, storyline).await
    }

    fn traced(&self, storyline: &Storyline) -> Self {
        let transcript: Arc<dyn Transcript> = Arc::new(storyline.clone());
        Self {
            generator: self.generator.with_transcript(Arc::clone(&transcript)),
            judge: self.judge.with_transcript(transcript),
            gateway: self.gateway.clone(),
            config: self.config.clone(),
        }
    }

    async fn drive(
        &self,
        prompt: &str,
        repo_root: Option<&Path>,
        storyline: &Storyline,
    ) -> Result<CorrectionOutcome, LintError> {
        let initial = RetryBudget::new(self.config.retries);
        let mut state = PipelineState::new(prompt, initial);
        let mut summary = CorrectionSummary::default();

        let context = match repo_root {
            Some(root) if self.config.repository_context => {
                let tools = RepoTools::new(root);
                match tokio::task::spawn_blocking(move || tools.repository_context()).await {
                    Ok(context) => Some(context),
                    Err(err) => {
                        warn!(error = %err, "Repository context task failed");
                        None
                    }
                }
            }
            _ => None,
        };

        let generation_response = self.generate(&mut state, context.as_deref(), storyline).await;
        summary.generation_failed = generation_response.is_none();
        let invalid_format = generation_response
            .as_deref()
            .map(detect_invalid_format)
            .unwrap_or(true);

        let mut phase = Phase::Generated;
        while phase != Phase::Done {
            if phase.is_fixing() {
                self.detect(phase, &mut state, &mut summary, storyline).await?;
            }
            loop {
                let detection = Detection::from_state(phase, &state);
                match transition(phase, &detection, &state.budget) {
                    Step::Correct(current) => {
                        self.correct(current, &mut state, storyline).await;
                        summary.corrector_invocations += 1;
                        self.detect(current, &mut state, &mut summary, storyline).await?;
                        state.budget.consume(current);
                        debug!(
                            phase = current.as_str(),
                            retries_left = state.budget.remaining(current),
                            "Correction round finished"
                        );
                    }
                    Step::Advance(next) => {
                        phase = next;
                        break;
                    }
                }
            }
        }

        summary.syntax_retries_used = initial.remaining(Phase::SyntaxFixing)
            - state.budget.remaining(Phase::SyntaxFixing);
        summary.intent_retries_used = initial.remaining(Phase::IntentFixing)
            - state.budget.remaining(Phase::IntentFixing);
        summary.vulnerability_retries_used = initial.remaining(Phase::VulnerabilityFixing)
            - state.budget.remaining(Phase::VulnerabilityFixing);

        info!(
            has_workflow = state.workflow.is_some(),
            syntax_valid = state.static_check.as_ref().is_some_and(|r| r.valid),
            judge_score = ?state.judge_score,
            vulnerabilities = state.vulnerabilities.as_ref().map_or(0, Vec::len),
            corrector_invocations = summary.corrector_invocations,
            "Correction pipeline finished"
        );

        Ok(CorrectionOutcome {
            state,
            generation_response,
            invalid_format,
            summary,
        })
    }

    /// Initial generation. A failed call leaves the document absent.
    async fn generate(
        &self,
        state: &mut PipelineState,
        context: Option<&str>,
        storyline: &Storyline,
    ) -> Option<String> {
        let role = AgentRole::Generator;
        let user_prompt = generator_prompt(&state.prompt, context);
        info!(agent = role.identifier(), model = self.generator.model(), "Calling LLM");

        match self.generator.complete(role.system_prompt(), &user_prompt).await {
            Ok(text) => {
                state.llm_response = Some(text.clone());
                state.workflow = extract_yaml(&text).map(WorkflowYaml::from);
                storyline.record(role.identifier(), state, &text).await;
                storyline.record("extract_workflow", state, &state.workflow_str()).await;
                Some(text)
            }
            Err(err) => {
                warn!(agent = role.identifier(), error = %err, "Generation failed, continuing without a workflow");
                storyline.record(role.identifier(), state, &err.to_string()).await;
                None
            }
        }
    }

    /// Run the detector of `phase` and store its fresh result.
    async fn detect(
        &self,
        phase: Phase,
        state: &mut PipelineState,
        summary: &mut CorrectionSummary,
        storyline: &Storyline,
    ) -> Result<(), LintError> {
        match phase {
            Phase::SyntaxFixing => {
                let report = self.gateway.check_syntax(state.workflow.as_ref()).await?;
                debug!(issues = report.diagnostics.len(), "Static checker completed");
                state.static_check = Some(report);
                storyline.record("static_checker", state, &state.static_check).await;
            }
            Phase::IntentFixing => {
                summary.judge_invocations += 1;
                match run_judgement(&self.judge, &state.prompt, state.workflow_str()).await {
                    Ok(judgement) => {
                        state.judgement = Some(judgement.text);
                        state.judge_score = Some(judgement.score);
                    }
                    Err(JudgeError::ScoreNotFound { attempts }) => {
                        warn!(attempts, "Judge gave no score");
                        state.judge_score = None;
                    }
                    Err(JudgeError::Llm(err)) => {
                        warn!(error = %err, "Judge call failed");
                        state.judge_score = None;
                    }
                }
                debug!(judge_score = ?state.judge_score, "Judge score extracted");
                storyline.record("extract_judge_score", state, &state.judge_score).await;
            }
            Phase::VulnerabilityFixing => {
                let findings = self
                    .gateway
                    .scan_vulnerabilities(state.workflow.as_ref())
                    .await?;
                debug!(findings = findings.len(), "Vulnerability scanner completed");
                state.vulnerabilities = Some(findings);
                storyline.record("vulnerability_scanner", state, &state.vulnerabilities).await;
            }
            Phase::Generated | Phase::Done => {}
        }
        Ok(())
    }

    /// One corrector round. Failures and unextractable replies keep the current document.
    async fn correct(&self, phase: Phase, state: &mut PipelineState, storyline: &Storyline) {
        let role = match phase {
            Phase::SyntaxFixing => AgentRole::SyntaxCorrector,
            Phase::IntentFixing => AgentRole::IntentCorrector,
            Phase::VulnerabilityFixing => AgentRole::VulnerabilityCorrector,
            Phase::Generated | Phase::Done => return,
        };

        let static_check = state
            .static_check
            .as_ref()
            .map(format_diagnostics)
            .unwrap_or_default();
        let vulnerabilities = state
            .vulnerabilities
            .as_deref()
            .map(format_findings)
            .unwrap_or_default();
        let judgement = state.judgement.clone().unwrap_or_default();
        let user_prompt = role.render(
            &PromptVars::new(&state.prompt)
                .with_workflow(state.workflow_str())
                .with_static_check(&static_check)
                .with_judgement(&judgement)
                .with_vulnerabilities(&vulnerabilities),
        );

        info!(agent = role.identifier(), model = self.generator.model(), "Calling LLM");
        match self.generator.complete(role.system_prompt(), &user_prompt).await {
            Ok(text) => {
                let candidate = extract_yaml(&text).map(WorkflowYaml::from);
                state.llm_response = Some(text);
                if !state.accept_candidate(candidate) {
                    debug!(agent = role.identifier(), "No workflow in corrector reply, keeping previous");
                }
                storyline.record(role.identifier(), state, &state.llm_response).await;
            }
            Err(err) => {
                warn!(agent = role.identifier(), error = %err, "Corrector call failed, keeping previous workflow");
                storyline.record(role.identifier(), state, &err.to_string()).await;
            }
        }
    }
}
