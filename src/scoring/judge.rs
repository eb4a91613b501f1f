//! Intent judgement: asking the judge model for a 1-5 rating and reading it back.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::correction::agents::{AgentRole, PromptVars};
use crate::error::JudgeError;
use crate::llm::CompletionGate;

/// Judging calls made before giving up on score extraction.
pub const JUDGE_ATTEMPTS: u32 = 2;

/// Score patterns, most specific first.
const SCORE_PATTERNS: &[&str] = &[
    r"\*{0,2}Overall Assessment\*{0,2}:\s*\*{0,2}(\d+(?:\.\d+)?)\s*out of\s*5\*{0,2}",
    r"\*{0,2}Final Score\*{0,2}:\s*\*{0,2}(\d+(?:\.\d+)?)\s*out of\s*5\*{0,2}",
    r"\*{0,2}Rating\*{0,2}:\s*\*{0,2}(\d+(?:\.\d+)?)\s*out of\s*5\*{0,2}",
    r"\*{0,2}Score\*{0,2}:\s*\*{0,2}\s*(\d+(?:\.\d+)?)\s*out of\s*5\*{0,2}",
    r"score of\s*\*{0,2}(\d+(?:\.\d+)?)\*{0,2}\s*out of\s*5",
    r"\*{0,2}(\d+(?:\.\d+)?)\s*out of\s*5\*{0,2}",
    r"\*{0,2}Score\*{0,2}:\s*\*{0,2}(\d+(?:\.\d+)?)\s*\*{0,2}/\s*\*{0,2}5\*{0,2}",
    r"\*{0,2}(\d+(?:\.\d+)?)\s*\*{0,2}/\s*\*{0,2}5\*{0,2}",
    r"\*{0,2}Score\*{0,2}\n*\*{0,2}(\d+(?:\.\d+)?)\s*\*{0,2}",
    r"\*{0,2}Final score\*{0,2}:\s*\*{0,2}(\d+(?:\.\d+)?)\s*\*{0,2}\*{0,2}",
];

fn score_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        SCORE_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
            .collect()
    })
}

/// Extract the judge score from free text. The first matching pattern wins.
pub fn extract_judge_score(text: &str) -> Option<f64> {
    score_regexes().iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    })
}

/// A judge reply together with the score read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub text: String,
    pub score: f64,
}

/// Ask the judge to rate `workflow` against `prompt`.
///
/// If the first reply carries no score the judge is asked exactly once more;
/// a second miss yields [`JudgeError::ScoreNotFound`].
pub async fn run_judgement(
    judge: &CompletionGate,
    prompt: &str,
    workflow: Option<&str>,
) -> Result<Judgement, JudgeError> {
    let user_prompt = AgentRole::Judge.render(&PromptVars::new(prompt).with_workflow(workflow));

    for attempt in 1..=JUDGE_ATTEMPTS {
        let text = judge
            .complete(AgentRole::Judge.system_prompt(), &user_prompt)
            .await?;
        if let Some(score) = extract_judge_score(&text) {
            return Ok(Judgement { text, score });
        }
        tracing::debug!(model = judge.model(), attempt, "No score found in judgement");
    }

    Err(JudgeError::ScoreNotFound {
        attempts: JUDGE_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_conclusion() {
        let text = "The workflow covers everything.\n\nTherefore, I would rate the workflow with a score of **4 out of 5**.";
        assert_eq!(extract_judge_score(text), Some(4.0));
    }

    #[test]
    fn test_patterns() {
        assert_eq!(extract_judge_score("**Overall Assessment**: 3 out of 5"), Some(3.0));
        assert_eq!(extract_judge_score("final score: **2.5 out of 5**"), Some(2.5));
        assert_eq!(extract_judge_score("Rating: 5 out of 5"), Some(5.0));
        assert_eq!(extract_judge_score("Score: 3/5"), Some(3.0));
        assert_eq!(extract_judge_score("I give it **4/5**"), Some(4.0));
        assert_eq!(extract_judge_score("### Score\n2"), Some(2.0));
        assert_eq!(extract_judge_score("no rating here"), None);
        assert_eq!(extract_judge_score(""), None);
    }

    #[test]
    fn test_priority_order() {
        // an earlier pattern wins over a later one that matches first in the text
        let text = "Step 1/5 looked fine. Rating: 2 out of 5";
        assert_eq!(extract_judge_score(text), Some(2.0));
    }

    #[test]
    fn test_extraction_idempotent() {
        let text = "Final Score: 4 out of 5";
        assert_eq!(extract_judge_score(text), extract_judge_score(text));
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(score_regexes().len(), SCORE_PATTERNS.len());
    }
}
