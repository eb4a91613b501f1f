//! Workflow documents and evaluation work items.
//!
//! A [`WorkItem`] is one ground-truth GitHub Actions workflow together with
//! the repository it belongs to, its structural metrics and three prompts of
//! increasing detail. A [`WorkflowYaml`] is any workflow document flowing
//! through the pipeline; an absent document is modelled as
//! `Option<WorkflowYaml>::None`.

pub mod dataset;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

pub use dataset::{find_by_id, load_dataset, parse_dataset};

/// Conventional location of workflow definitions inside a repository.
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// Trigger used when a work item lists none.
pub const DEFAULT_EVENT: &str = "push";

/// A textual GitHub Actions workflow document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowYaml(String);

impl WorkflowYaml {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for WorkflowYaml {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for WorkflowYaml {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for WorkflowYaml {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowYaml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The structural metrics a difficulty tier is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuralMetrics {
    pub cyclomatic_complexity: u32,
    pub job_count: u32,
    pub step_count: u32,
    pub reusable_workflow_count: u32,
    pub trigger_count: u32,
    pub actions: Vec<String>,
}

/// One evaluation candidate loaded from a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    #[serde(default)]
    pub repository_id: Option<u64>,
    pub repository_name: String,
    pub repository_owner: String,
    pub file_name: String,
    /// Raw file content as found in the repository.
    pub file_content: String,
    #[serde(rename = "mainLanguage", default)]
    pub main_language: Option<String>,
    #[serde(default)]
    pub tokens_count: Option<u64>,
    #[serde(default)]
    pub augmented_workflow: Option<String>,
    /// Normalized ground-truth workflow used for scoring.
    pub workflow: WorkflowYaml,
    #[serde(default)]
    pub triggers: Vec<String>,
    pub nb_triggers: u32,
    #[serde(default)]
    pub nb_actions: u32,
    pub nb_jobs: u32,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub actions_details: Vec<serde_json::Value>,
    pub nb_reusable_workflows: u32,
    #[serde(default)]
    pub reusable_workflows: Vec<String>,
    #[serde(default)]
    pub nb_steps: u32,
    pub cyclomatic_complexity: u32,
    pub prompt_level1: String,
    pub prompt_level2: String,
    pub prompt_level3: String,
}

impl WorkItem {
    /// Prompt at the given detail level (1..=3).
    pub fn prompt(&self, level: u8) -> Result<&str, DatasetError> {
        match level {
            1 => Ok(&self.prompt_level1),
            2 => Ok(&self.prompt_level2),
            3 => Ok(&self.prompt_level3),
            other => Err(DatasetError::InvalidPromptLevel(other)),
        }
    }

    /// `owner/name` identity of the repository.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.repository_owner, self.repository_name)
    }

    /// Structural metrics of the ground-truth workflow.
    pub fn metrics(&self) -> StructuralMetrics {
        StructuralMetrics {
            cyclomatic_complexity: self.cyclomatic_complexity,
            job_count: self.nb_jobs,
            step_count: self.nb_steps,
            reusable_workflow_count: self.nb_reusable_workflows,
            trigger_count: self.nb_triggers,
            actions: self.actions.clone(),
        }
    }

    /// Event used to trigger the functional test.
    pub fn event_type(&self) -> &str {
        self.triggers
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_EVENT)
    }

    /// Checkout of the repository under `repositories_dir`.
    pub fn repository_path(&self, repositories_dir: &Path) -> PathBuf {
        repositories_dir.join(&self.repository_name)
    }

    /// Location of the ground-truth workflow inside its repository.
    pub fn workflow_path(&self, repositories_dir: &Path) -> PathBuf {
        self.repository_path(repositories_dir)
            .join(WORKFLOWS_DIR)
            .join(&self.file_name)
    }
}
