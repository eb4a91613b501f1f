//! Batch evaluation of work items over a bounded worker pool.
//!
//! Each item is processed in its own task: the ground-truth workflow is hidden
//! from its repository, the correction pipeline generates a candidate, the
//! functional test runner exercises it and the aggregator scores it. At most
//! `workers` items run at once and one repository is never processed by two
//! items concurrently. Failures and panics become degraded records.

pub mod hidden;
pub mod locks;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub use hidden::{HiddenWorkflow, HIDDEN_DIR};
pub use locks::RepoLocks;

use crate::correction::{CorrectionPipeline, Storyline};
use crate::sandbox::{FunctionalTestRunner, TestOutcome};
use crate::scoring::{summarize_by_tier, BatchSummary, ScoreAggregator, ScoreInput, ScoreRecord};
use crate::workflow::WorkItem;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Outcome used for an item that produced no document.
pub const NO_WORKFLOW_ERROR: &str = "No workflow to test";

/// Configuration of a [`BatchDriver`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub workers: usize,
    pub prompt_level: u8,
    /// Root holding one checkout per repository.
    pub repositories_dir: PathBuf,
    /// Storyline directory; `None` disables storylines.
    pub logs_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            prompt_level: 1,
            repositories_dir: PathBuf::from("repositories"),
            logs_dir: None,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_prompt_level(mut self, level: u8) -> Self {
        self.prompt_level = level;
        self
    }

    pub fn with_repositories_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.repositories_dir = dir.into();
        self
    }

    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = Some(dir.into());
        self
    }
}

/// Records and summaries of one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One record per input item, in input order.
    pub records: Vec<ScoreRecord>,
    /// Per-tier summaries plus the overall one.
    pub summaries: BTreeMap<String, BatchSummary>,
    pub failed: usize,
    pub duration_secs: f64,
}

impl BatchReport {
    pub fn overall(&self) -> Option<&BatchSummary> {
        self.summaries.get(crate::scoring::OVERALL_KEY)
    }
}

/// Functional test result of one ground-truth workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionalCheck {
    pub workflow_id: u64,
    pub repository: String,
    pub file_name: String,
    pub functional_test: TestOutcome,
}

/// Runs the full evaluation of a set of work items.
#[derive(Clone)]
pub struct BatchDriver {
    config: BatchConfig,
    pipeline: CorrectionPipeline,
    runner: FunctionalTestRunner,
    aggregator: ScoreAggregator,
    locks: RepoLocks,
}

impl BatchDriver {
    pub fn new(
        config: BatchConfig,
        pipeline: CorrectionPipeline,
        runner: FunctionalTestRunner,
        aggregator: ScoreAggregator,
    ) -> Self {
        Self {
            config,
            pipeline,
            runner,
            aggregator,
            locks: RepoLocks::new(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn repository_root(&self, item: &WorkItem) -> Option<PathBuf> {
        let root = item.repository_path(&self.config.repositories_dir);
        root.is_dir().then_some(root)
    }

    /// Evaluate every item and summarize the results.
    pub async fn run(&self, items: &[WorkItem]) -> BatchReport {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        info!(
            items = items.len(),
            workers = self.config.workers,
            prompt_level = self.config.prompt_level,
            "Starting batch"
        );

        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            let driver = self.clone();
            let item = item.clone();
            let semaphore = Arc::clone(&semaphore);
            let lock = self.locks.lock_for(&item.repository_name);
            handles.push(tokio::spawn(async move {
                // repository first: items queued behind a busy repository hold no worker slot
                let _repository = lock.lock_owned().await;
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("worker pool closed")?;
                driver.evaluate(&item).await
            }));
        }

        let graph_name = self.aggregator.graph_name();
        let mut records = Vec::with_capacity(items.len());
        let mut failed = 0;
        let results = futures::future::join_all(handles).await;
        for (item, result) in items.iter().zip(results) {
            let record = match result {
                Ok(Ok(record)) => record,
                Ok(Err(err)) => {
                    failed += 1;
                    let message = format!("{err:#}");
                    error!(item_id = item.id, error = %message, "Item failed");
                    ScoreRecord::failed(item, self.config.prompt_level, graph_name, message)
                }
                Err(err) => {
                    failed += 1;
                    error!(item_id = item.id, error = %err, "Item task panicked");
                    ScoreRecord::failed(item, self.config.prompt_level, graph_name, err.to_string())
                }
            };
            records.push(record);
        }

        let summaries = summarize_by_tier(&records);
        let duration_secs = started.elapsed().as_secs_f64();
        info!(
            records = records.len(),
            failed,
            duration_secs,
            "Batch finished"
        );
        BatchReport {
            records,
            summaries,
            failed,
            duration_secs,
        }
    }

    /// Evaluate one item while holding its repository lock.
    pub async fn process_item(&self, item: &WorkItem) -> anyhow::Result<ScoreRecord> {
        let lock = self.locks.lock_for(&item.repository_name);
        let _repository = lock.lock().await;
        self.evaluate(item).await
    }

    /// Caller holds the repository lock of `item`.
    async fn evaluate(&self, item: &WorkItem) -> anyhow::Result<ScoreRecord> {
        let prompt_level = self.config.prompt_level;
        let prompt = item.prompt(prompt_level)?;
        debug!(item_id = item.id, repository = %item.full_name(), "Processing item");

        let repo_root = self.repository_root(item);
        if repo_root.is_none() {
            warn!(item_id = item.id, repository = %item.repository_name, "Repository checkout not found");
        }
        let _hidden = HiddenWorkflow::hide(&self.config.repositories_dir, item)
            .with_context(|| format!("failed to hide workflow of item {}", item.id))?;

        let storyline = match &self.config.logs_dir {
            Some(dir) => Storyline::open(dir, item.id).await,
            None => Storyline::disabled(),
        };

        let outcome = self
            .pipeline
            .run(prompt, repo_root.as_deref(), &storyline)
            .await?;

        let functional_test = match outcome.final_workflow() {
            Some(workflow) => {
                self.runner
                    .run_test(workflow.as_str(), item.event_type(), repo_root.as_deref())
                    .await
            }
            None => TestOutcome::failed(NO_WORKFLOW_ERROR),
        };

        let record = self
            .aggregator
            .score(ScoreInput {
                item,
                prompt_level,
                generated: outcome.final_workflow(),
                invalid_format: outcome.invalid_format,
                functional_test,
                correction: Some(outcome.summary.clone()),
                storyline: Some(&storyline),
            })
            .await?;

        storyline.record_score(&record).await;
        info!(
            item_id = item.id,
            tier = %record.difficulty_tier,
            judge_score = record.judge_score,
            lint_valid = record.lint_valid,
            functional = record.functional_test.success,
            "Item scored"
        );
        Ok(record)
    }
}

/// Functionally test the ground-truth workflows of `items`.
///
/// Checks harness health without any generation. Bounded by `workers`.
pub async fn test_workflows(
    runner: &FunctionalTestRunner,
    items: &[WorkItem],
    repositories_dir: &Path,
    workers: usize,
) -> Vec<FunctionalCheck> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let locks = RepoLocks::new();
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let runner = runner.clone();
        let item = item.clone();
        let semaphore = Arc::clone(&semaphore);
        let lock = locks.lock_for(&item.repository_name);
        let repo_root = item.repository_path(repositories_dir);
        handles.push(tokio::spawn(async move {
            let _repository = lock.lock_owned().await;
            let _permit = semaphore.acquire_owned().await.ok();
            let repo_root = repo_root.is_dir().then_some(repo_root);
            runner
                .run_test(&item.file_content, item.event_type(), repo_root.as_deref())
                .await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let mut checks = Vec::with_capacity(items.len());
    for (item, result) in items.iter().zip(results) {
        let functional_test = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(item_id = item.id, error = %err, "Functional test task panicked");
                TestOutcome::failed(err.to_string())
            }
        };
        info!(
            item_id = item.id,
            success = functional_test.success,
            "Ground-truth workflow tested"
        );
        checks.push(FunctionalCheck {
            workflow_id: item.id,
            repository: item.full_name(),
            file_name: item.file_name.clone(),
            functional_test,
        });
    }
    checks
}
