//! Difficulty tiering for evaluation work items.
//!
//! The tier is derived from the structural metrics of the ground-truth
//! workflow, never from the outcome of a run, so it is stable across
//! benchmark runs and models.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::workflow::StructuralMetrics;

/// Highest score still considered easy.
const EASY_MAX: u32 = 2;
/// Highest score still considered medium.
const MEDIUM_MAX: u32 = 5;
/// Weight of each reusable workflow reference.
const REUSABLE_WEIGHT: u32 = 3;

/// The difficulty tier of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Easy,
    Medium,
    Hard,
}

impl DifficultyTier {
    /// All tiers in ascending order.
    pub const ALL: [DifficultyTier; 3] = [
        DifficultyTier::Easy,
        DifficultyTier::Medium,
        DifficultyTier::Hard,
    ];

    /// Map a difficulty score to its tier.
    pub fn from_score(score: u32) -> Self {
        if score <= EASY_MAX {
            DifficultyTier::Easy
        } else if score <= MEDIUM_MAX {
            DifficultyTier::Medium
        } else {
            DifficultyTier::Hard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "easy",
            DifficultyTier::Medium => "medium",
            DifficultyTier::Hard => "hard",
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of actions whose reference mentions docker, case-insensitively.
pub fn docker_action_count(actions: &[String]) -> u32 {
    actions
        .iter()
        .filter(|action| action.to_lowercase().contains("docker"))
        .count() as u32
}

/// Calculates the difficulty score of a workflow.
///
/// `cyclomatic + jobs + 3 * reusable + (triggers > 1) + docker actions`
pub fn difficulty_score(metrics: &StructuralMetrics) -> u32 {
    let multi_trigger = u32::from(metrics.trigger_count > 1);
    metrics
        .cyclomatic_complexity
        .saturating_add(metrics.job_count)
        .saturating_add(metrics.reusable_workflow_count.saturating_mul(REUSABLE_WEIGHT))
        .saturating_add(multi_trigger)
        .saturating_add(docker_action_count(&metrics.actions))
}

/// Score and tier of a workflow in one call.
pub fn classify(metrics: &StructuralMetrics) -> (u32, DifficultyTier) {
    let score = difficulty_score(metrics);
    (score, DifficultyTier::from_score(score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(
        cyclomatic: u32,
        jobs: u32,
        reusable: u32,
        triggers: u32,
        actions: &[&str],
    ) -> StructuralMetrics {
        StructuralMetrics {
            cyclomatic_complexity: cyclomatic,
            job_count: jobs,
            step_count: 0,
            reusable_workflow_count: reusable,
            trigger_count: triggers,
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(DifficultyTier::from_score(0), DifficultyTier::Easy);
        assert_eq!(DifficultyTier::from_score(2), DifficultyTier::Easy);
        assert_eq!(DifficultyTier::from_score(3), DifficultyTier::Medium);
        assert_eq!(DifficultyTier::from_score(5), DifficultyTier::Medium);
        assert_eq!(DifficultyTier::from_score(6), DifficultyTier::Hard);
    }

    #[test]
    fn test_single_job_single_trigger_is_easy() {
        let (score, tier) = classify(&metrics(1, 1, 0, 1, &[]));
        assert_eq!(score, 2);
        assert_eq!(tier, DifficultyTier::Easy);
    }

    #[test]
    fn test_reusable_and_multi_trigger_is_hard() {
        let (score, tier) = classify(&metrics(2, 2, 1, 2, &[]));
        assert_eq!(score, 8);
        assert_eq!(tier, DifficultyTier::Hard);
    }

    #[test]
    fn test_docker_actions_counted_case_insensitively() {
        let m = metrics(
            1,
            1,
            0,
            1,
            &[
                "actions/checkout@v4",
                "Docker/build-push-action@v5",
                "docker/login-action@v3",
            ],
        );
        assert_eq!(docker_action_count(&m.actions), 2);
        assert_eq!(difficulty_score(&m), 4);
    }

    #[test]
    fn test_tier_serde_and_display() {
        assert_eq!(
            serde_json::to_string(&DifficultyTier::Medium).unwrap(),
            "\"medium\""
        );
        assert_eq!(DifficultyTier::Hard.to_string(), "hard");
        assert_eq!(DifficultyTier::ALL.len(), 3);
    }
}
