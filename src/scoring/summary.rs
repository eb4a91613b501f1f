//! Aggregate metrics over a batch of score records.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::record::ScoreRecord;
use crate::difficulty::DifficultyTier;

/// Key of the summary covering every record.
pub const OVERALL_KEY: &str = "overall";

/// Averages and rates over a group of records.
///
/// Degraded records count towards every average with their zero values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub avg_bleu: f64,
    pub avg_meteor: f64,
    pub avg_judge_score: f64,
    pub lint_success_rate: f64,
    pub functional_success_rate: f64,
    pub count: usize,
}

impl BatchSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoreRecord>,
    {
        let mut summary = Self::default();
        for record in records {
            summary.count += 1;
            summary.avg_bleu += record.bleu_score;
            summary.avg_meteor += record.meteor_score;
            summary.avg_judge_score += record.judge_score;
            if record.lint_valid {
                summary.lint_success_rate += 1.0;
            }
            if record.functional_test.success {
                summary.functional_success_rate += 1.0;
            }
        }
        if summary.count > 0 {
            let n = summary.count as f64;
            summary.avg_bleu /= n;
            summary.avg_meteor /= n;
            summary.avg_judge_score /= n;
            summary.lint_success_rate /= n;
            summary.functional_success_rate /= n;
        }
        summary
    }
}

/// One summary per non-empty tier, keyed by tier name, plus [`OVERALL_KEY`].
pub fn summarize_by_tier(records: &[ScoreRecord]) -> BTreeMap<String, BatchSummary> {
    let mut summaries = BTreeMap::new();
    for tier in DifficultyTier::ALL {
        let group: Vec<&ScoreRecord> = records
            .iter()
            .filter(|r| r.difficulty_tier == tier)
            .collect();
        if group.is_empty() {
            continue;
        }
        summaries.insert(tier.to_string(), BatchSummary::from_records(group));
    }
    summaries.insert(OVERALL_KEY.to_string(), BatchSummary::from_records(records));
    summaries
}

/// Paths of the files written by [`write_results`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFiles {
    pub scores: PathBuf,
    pub overview: PathBuf,
}

impl ResultFiles {
    pub fn new(results_dir: &Path, suffix: &str) -> Self {
        Self {
            scores: results_dir.join(format!("scores_{suffix}.jsonl")),
            overview: results_dir.join(format!("overview_{suffix}.json")),
        }
    }
}

/// Write records as NDJSON and the tier summaries as pretty JSON.
pub fn write_results(
    results_dir: &Path,
    suffix: &str,
    records: &[ScoreRecord],
    summaries: &BTreeMap<String, BatchSummary>,
) -> anyhow::Result<ResultFiles> {
    fs::create_dir_all(results_dir)?;
    let files = ResultFiles::new(results_dir, suffix);

    let mut writer = BufWriter::new(fs::File::create(&files.scores)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    fs::write(&files.overview, serde_json::to_string_pretty(summaries)?)?;

    info!(
        scores = %files.scores.display(),
        overview = %files.overview.display(),
        records = records.len(),
        "Results written"
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fixtures::work_item;

    fn record(id: u64, tier: DifficultyTier, bleu: f64, lint_valid: bool) -> ScoreRecord {
        let mut record = ScoreRecord::failed(&work_item(id), 1, "main", "x");
        record.error = None;
        record.difficulty_tier = tier;
        record.bleu_score = bleu;
        record.judge_score = 4.0;
        record.lint_valid = lint_valid;
        record
    }

    #[test]
    fn test_summary_averages() {
        let records = vec![
            record(1, DifficultyTier::Easy, 0.5, true),
            record(2, DifficultyTier::Easy, 0.1, false),
        ];
        let summary = BatchSummary::from_records(&records);
        assert_eq!(summary.count, 2);
        assert!((summary.avg_bleu - 0.3).abs() < 1e-9);
        assert!((summary.avg_judge_score - 4.0).abs() < 1e-9);
        assert!((summary.lint_success_rate - 0.5).abs() < 1e-9);
        assert_eq!(summary.functional_success_rate, 0.0);
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let summary = BatchSummary::from_records(&[]);
        assert_eq!(summary, BatchSummary::default());
    }

    #[test]
    fn test_tiers_skip_empty_groups() {
        let records = vec![
            record(1, DifficultyTier::Easy, 1.0, true),
            record(2, DifficultyTier::Hard, 0.0, false),
        ];
        let summaries = summarize_by_tier(&records);
        let keys: Vec<&str> = summaries.keys().map(String::as_str).collect();
        assert_eq!(keys, ["easy", "hard", "overall"]);
        assert_eq!(summaries["overall"].count, 2);
        assert_eq!(summaries["hard"].lint_success_rate, 0.0);
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(1, DifficultyTier::Medium, 0.2, true)];
        let summaries = summarize_by_tier(&records);
        let files = write_results(dir.path(), "run1", &records, &summaries).unwrap();

        assert!(files.scores.ends_with("scores_run1.jsonl"));
        let scores = std::fs::read_to_string(&files.scores).unwrap();
        assert_eq!(scores.lines().count(), 1);
        let line: serde_json::Value = serde_json::from_str(scores.trim()).unwrap();
        assert_eq!(line["workflow_id"], 1);

        let overview: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files.overview).unwrap()).unwrap();
        assert_eq!(overview["medium"]["count"], 1);
        assert_eq!(overview["overall"]["lint_success_rate"], 1.0);
    }
}
