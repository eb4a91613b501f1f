//! Per-item score records and the aggregator that builds them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::judge::run_judgement;
use super::similarity::{Bleu, Meteor, SimilarityScorer};
use crate::correction::{CorrectionSummary, Storyline};
use crate::difficulty::{classify, DifficultyTier};
use crate::error::ScoreError;
use crate::lint::{Diagnostic, ValidationGateway, VulnerabilityFinding};
use crate::llm::CompletionGate;
use crate::sandbox::TestOutcome;
use crate::workflow::{WorkItem, WorkflowYaml};

/// Judgement stored for an absent document.
pub const EMPTY_JUDGEMENT: &str = "Workflow is empty";

/// Name recorded for the correction pipeline run.
pub const DEFAULT_GRAPH_NAME: &str = "main";

/// Everything measured for one work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub workflow_id: u64,
    pub repository: String,
    pub original_workflow: WorkflowYaml,
    pub generated_workflow: Option<WorkflowYaml>,

    pub judgement: String,
    pub judge_score: f64,
    pub bleu_score: f64,
    pub meteor_score: f64,

    pub lint_valid: bool,
    pub lint_output: Vec<Diagnostic>,
    pub vulnerabilities: Vec<VulnerabilityFinding>,
    pub invalid_format: bool,

    pub functional_test: TestOutcome,

    pub difficulty_tier: DifficultyTier,
    pub difficulty_score: u32,

    pub graph_name: String,
    pub prompt_level: u8,
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<CorrectionSummary>,
    /// Set on degraded records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreRecord {
    /// Degraded record for an item whose processing failed.
    pub fn failed(
        item: &WorkItem,
        prompt_level: u8,
        graph_name: &str,
        error: impl Into<String>,
    ) -> Self {
        let (difficulty_score, difficulty_tier) = classify(&item.metrics());
        let error = error.into();
        Self {
            workflow_id: item.id,
            repository: item.full_name(),
            original_workflow: item.workflow.clone(),
            generated_workflow: None,
            judgement: String::new(),
            judge_score: 0.0,
            bleu_score: 0.0,
            meteor_score: 0.0,
            lint_valid: false,
            lint_output: Vec::new(),
            vulnerabilities: Vec::new(),
            invalid_format: true,
            functional_test: TestOutcome::failed(error.clone()),
            difficulty_tier,
            difficulty_score,
            graph_name: graph_name.to_string(),
            prompt_level,
            prompt: item.prompt(prompt_level).unwrap_or_default().to_string(),
            correction: None,
            error: Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// What the aggregator needs besides the work item.
#[derive(Debug, Clone)]
pub struct ScoreInput<'a> {
    pub item: &'a WorkItem,
    pub prompt_level: u8,
    pub generated: Option<&'a WorkflowYaml>,
    pub invalid_format: bool,
    pub functional_test: TestOutcome,
    pub correction: Option<CorrectionSummary>,
    /// Receives the judge exchanges when set.
    pub storyline: Option<&'a Storyline>,
}

/// Combines lint, judgement, similarity and functional results into a [`ScoreRecord`].
#[derive(Clone)]
pub struct ScoreAggregator {
    gateway: ValidationGateway,
    judge: CompletionGate,
    bleu: Arc<dyn SimilarityScorer>,
    meteor: Arc<dyn SimilarityScorer>,
    graph_name: String,
}

impl ScoreAggregator {
    pub fn new(gateway: ValidationGateway, judge: CompletionGate) -> Self {
        Self {
            gateway,
            judge,
            bleu: Arc::new(Bleu),
            meteor: Arc::new(Meteor::default()),
            graph_name: DEFAULT_GRAPH_NAME.to_string(),
        }
    }

    pub fn with_graph_name(mut self, name: impl Into<String>) -> Self {
        self.graph_name = name.into();
        self
    }

    pub fn with_scorers(
        mut self,
        bleu: Arc<dyn SimilarityScorer>,
        meteor: Arc<dyn SimilarityScorer>,
    ) -> Self {
        self.bleu = bleu;
        self.meteor = meteor;
        self
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// Build the score record of one item.
    ///
    /// The final document is re-checked by the gateway. An absent document
    /// is judged "Workflow is empty" with score 0 without calling the judge.
    /// A judge that fails or gives no score yields score 0 with the error as
    /// judgement; the other measurements are kept.
    pub async fn score(&self, input: ScoreInput<'_>) -> Result<ScoreRecord, ScoreError> {
        let item = input.item;
        let prompt = item.prompt(input.prompt_level)?.to_string();

        let report = self.gateway.check_syntax(input.generated).await?;
        let vulnerabilities = self.gateway.scan_vulnerabilities(input.generated).await?;

        let reference = Some(item.workflow.as_str());
        let candidate = input.generated.map(WorkflowYaml::as_str);
        let bleu_score = self.bleu.score(reference, candidate);
        let meteor_score = self.meteor.score(reference, candidate);

        let judge = match input.storyline {
            Some(storyline) => self.judge.with_transcript(Arc::new(storyline.clone())),
            None => self.judge.clone(),
        };
        let (judgement, judge_score) = match input.generated {
            Some(workflow) => match run_judgement(&judge, &prompt, Some(workflow.as_str())).await {
                Ok(judgement) => (judgement.text, judgement.score),
                Err(err) => {
                    warn!(item_id = item.id, error = %err, "Judgement failed, scoring 0");
                    (err.to_string(), 0.0)
                }
            },
            None => (EMPTY_JUDGEMENT.to_string(), 0.0),
        };

        let (difficulty_score, difficulty_tier) = classify(&item.metrics());

        Ok(ScoreRecord {
            workflow_id: item.id,
            repository: item.full_name(),
            original_workflow: item.workflow.clone(),
            generated_workflow: input.generated.cloned(),
            judgement,
            judge_score,
            bleu_score,
            meteor_score,
            lint_valid: report.valid,
            lint_output: report.diagnostics,
            vulnerabilities,
            invalid_format: input.invalid_format,
            functional_test: input.functional_test,
            difficulty_tier,
            difficulty_score,
            graph_name: self.graph_name.clone(),
            prompt_level: input.prompt_level,
            prompt,
            correction: input.correction,
            error: None,
        })
    }
}
