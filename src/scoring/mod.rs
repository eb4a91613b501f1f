//! Scoring of generated workflows.
//!
//! - [`judge`]: LLM judgement on a 1..=5 scale and score extraction
//! - [`similarity`]: BLEU and METEOR against the ground truth
//! - [`record`]: per-item [`ScoreRecord`] built by the [`ScoreAggregator`]
//! - [`summary`]: per-tier batch summaries and result files

pub mod judge;
pub mod record;
pub mod similarity;
pub mod summary;

pub use judge::{extract_judge_score, run_judgement, Judgement, JUDGE_ATTEMPTS};
pub use record::{ScoreAggregator, ScoreInput, ScoreRecord, DEFAULT_GRAPH_NAME, EMPTY_JUDGEMENT};
pub use similarity::{normalize, Bleu, Meteor, SimilarityScorer};
pub use summary::{summarize_by_tier, write_results, BatchSummary, ResultFiles, OVERALL_KEY};
