//! Pure transition function of the correction pipeline.

use super::state::{Phase, PipelineState, RetryBudget};

/// What the current detector says about the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// No detector has run for this phase.
    Pending,
    Syntax { valid: bool },
    Intent { score: Option<f64> },
    Vulnerability { findings: usize },
}

impl Detection {
    /// Read the latest detector output of `phase` from the state.
    pub fn from_state(phase: Phase, state: &PipelineState) -> Self {
        match phase {
            Phase::SyntaxFixing => match &state.static_check {
                Some(report) => Detection::Syntax {
                    valid: report.valid,
                },
                None => Detection::Pending,
            },
            Phase::IntentFixing => Detection::Intent {
                score: state.judge_score,
            },
            Phase::VulnerabilityFixing => match &state.vulnerabilities {
                Some(findings) => Detection::Vulnerability {
                    findings: findings.len(),
                },
                None => Detection::Pending,
            },
            Phase::Generated | Phase::Done => Detection::Pending,
        }
    }

    /// Whether a problem is outstanding.
    ///
    /// Intent only counts as a problem when a score exists and is below 5;
    /// a missing score never triggers a correction.
    pub fn outstanding(&self) -> bool {
        match self {
            Detection::Pending => false,
            Detection::Syntax { valid } => !valid,
            Detection::Intent { score } => score.is_some_and(|s| s < 5.0),
            Detection::Vulnerability { findings } => *findings > 0,
        }
    }
}

/// Next move of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run one corrector round in this phase.
    Correct(Phase),
    /// Leave the current phase for this one.
    Advance(Phase),
}

/// Decide the next step from the current phase, detection and budget.
pub fn transition(phase: Phase, detection: &Detection, budget: &RetryBudget) -> Step {
    if phase.is_fixing() && detection.outstanding() && budget.remaining(phase) > 0 {
        Step::Correct(phase)
    } else {
        Step::Advance(phase.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_advances_to_syntax() {
        let step = transition(Phase::Generated, &Detection::Pending, &RetryBudget::new(5));
        assert_eq!(step, Step::Advance(Phase::SyntaxFixing));
    }

    #[test]
    fn test_invalid_syntax_with_budget_corrects() {
        let step = transition(
            Phase::SyntaxFixing,
            &Detection::Syntax { valid: false },
            &RetryBudget::new(1),
        );
        assert_eq!(step, Step::Correct(Phase::SyntaxFixing));
    }

    #[test]
    fn test_exhausted_budget_advances() {
        let budget = RetryBudget::new(5).with_phase(Phase::SyntaxFixing, 0);
        let step = transition(Phase::SyntaxFixing, &Detection::Syntax { valid: false }, &budget);
        assert_eq!(step, Step::Advance(Phase::IntentFixing));
    }

    #[test]
    fn test_clean_detection_advances() {
        let budget = RetryBudget::new(5);
        assert_eq!(
            transition(Phase::SyntaxFixing, &Detection::Syntax { valid: true }, &budget),
            Step::Advance(Phase::IntentFixing)
        );
        assert_eq!(
            transition(
                Phase::VulnerabilityFixing,
                &Detection::Vulnerability { findings: 0 },
                &budget
            ),
            Step::Advance(Phase::Done)
        );
    }

    #[test]
    fn test_intent_convergence() {
        let budget = RetryBudget::new(5);
        assert_eq!(
            transition(Phase::IntentFixing, &Detection::Intent { score: Some(4.5) }, &budget),
            Step::Correct(Phase::IntentFixing)
        );
        assert_eq!(
            transition(Phase::IntentFixing, &Detection::Intent { score: Some(5.0) }, &budget),
            Step::Advance(Phase::VulnerabilityFixing)
        );
        assert_eq!(
            transition(Phase::IntentFixing, &Detection::Intent { score: None }, &budget),
            Step::Advance(Phase::VulnerabilityFixing)
        );
    }

    #[test]
    fn test_done_is_terminal() {
        let step = transition(
            Phase::Done,
            &Detection::Vulnerability { findings: 3 },
            &RetryBudget::new(5),
        );
        assert_eq!(step, Step::Advance(Phase::Done));
    }

    #[test]
    fn test_detection_from_state() {
        let mut state = PipelineState::new("p", RetryBudget::new(1));
        assert_eq!(
            Detection::from_state(Phase::SyntaxFixing, &state),
            Detection::Pending
        );
        state.vulnerabilities = Some(Vec::new());
        assert_eq!(
            Detection::from_state(Phase::VulnerabilityFixing, &state),
            Detection::Vulnerability { findings: 0 }
        );
        state.judge_score = Some(3.0);
        assert!(Detection::from_state(Phase::IntentFixing, &state).outstanding());
    }

    #[test]
    fn test_driving_transition_never_exceeds_budget() {
        // simulate a corrector that never fixes anything
        let mut budget = RetryBudget::new(5);
        let mut phase = Phase::Generated;
        let mut corrections = 0;
        let mut previous = budget;
        while phase != Phase::Done {
            let detection = match phase {
                Phase::SyntaxFixing => Detection::Syntax { valid: false },
                Phase::IntentFixing => Detection::Intent { score: Some(1.0) },
                Phase::VulnerabilityFixing => Detection::Vulnerability { findings: 2 },
                _ => Detection::Pending,
            };
            match transition(phase, &detection, &budget) {
                Step::Correct(p) => {
                    assert!(budget.consume(p));
                    corrections += 1;
                }
                Step::Advance(next) => phase = next,
            }
            for p in [Phase::SyntaxFixing, Phase::IntentFixing, Phase::VulnerabilityFixing] {
                assert!(budget.remaining(p) <= previous.remaining(p));
            }
            previous = budget;
        }
        assert_eq!(corrections, 15);
    }
}
