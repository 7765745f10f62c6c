use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::question::QuestionKind;

//
// ─── ANSWER STATUS ─────────────────────────────────────────────────────────────
//

/// Grading status of a single question within a session.
///
/// Transitions only move forward out of `NotAttempted`; a graded question is
/// never re-graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerStatus {
    NotAttempted,
    Correct,
    Incorrect,
    Partial,
}

impl AnswerStatus {
    #[must_use]
    pub fn is_attempted(&self) -> bool {
        !matches!(self, Self::NotAttempted)
    }
}

//
// ─── SUBMITTED ANSWER ──────────────────────────────────────────────────────────
//

/// A submitted answer, shaped by question type.
///
/// Numeric input is kept as the raw text the user typed; parsing happens at
/// grading time so that non-numeric input can still consume the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Answer {
    None,
    /// SBA: index into the option order in effect for this session.
    Choice { index: usize },
    /// MBA: selected option indices.
    Choices { indices: BTreeSet<usize> },
    /// EMQ: one selection per stem, `None` while unanswered.
    PerStem { selections: Vec<Option<usize>> },
    /// Numeric: raw text as typed.
    Text { raw: String },
}

impl Answer {
    /// The empty answer appropriate for a question kind.
    #[must_use]
    pub fn initial_for(kind: &QuestionKind) -> Self {
        match kind {
            QuestionKind::Sba { .. } | QuestionKind::Numeric { .. } => Self::None,
            QuestionKind::Mba { .. } => Self::Choices {
                indices: BTreeSet::new(),
            },
            QuestionKind::Emq { stems, .. } => Self::PerStem {
                selections: vec![None; stems.len()],
            },
        }
    }
}

//
// ─── SHUFFLED OPTION ORDER ─────────────────────────────────────────────────────
//

/// Correctness indices remapped into a shuffled option order.
///
/// Present only for SBA and EMQ questions; the canonical `Question` is never
/// mutated by shuffling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShuffledCorrect {
    Single(usize),
    PerStem(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuffledOrder {
    pub options: Vec<String>,
    pub correct: ShuffledCorrect,
}

//
// ─── QUESTION STATE ────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("question already attempted")]
    AlreadyAttempted,
}

/// Mutable per-question session state, index-aligned with the working order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionState {
    pub status: AnswerStatus,
    pub answer: Answer,
    pub flagged: bool,
    pub shuffled: Option<ShuffledOrder>,
    pub struck_out: BTreeSet<usize>,
}

impl QuestionState {
    /// Fresh state for a question entering a session.
    #[must_use]
    pub fn initial(kind: &QuestionKind) -> Self {
        Self {
            status: AnswerStatus::NotAttempted,
            answer: Answer::initial_for(kind),
            flagged: false,
            shuffled: None,
            struck_out: BTreeSet::new(),
        }
    }

    /// Records a graded answer.
    ///
    /// # Errors
    ///
    /// Returns `StateError::AlreadyAttempted` if the question was graded
    /// before; status never moves backward and the answer never changes once
    /// set.
    pub fn record(&mut self, status: AnswerStatus, answer: Answer) -> Result<(), StateError> {
        if self.status.is_attempted() {
            return Err(StateError::AlreadyAttempted);
        }
        debug_assert!(status.is_attempted());
        self.status = status;
        self.answer = answer;
        Ok(())
    }

    /// Toggles the strike-out marker on an option index, returning the new
    /// struck state.
    pub fn toggle_strike(&mut self, index: usize) -> bool {
        if self.struck_out.remove(&index) {
            false
        } else {
            self.struck_out.insert(index);
            true
        }
    }

    /// Option list in effect for display: the shuffled order when present,
    /// otherwise the canonical one.
    #[must_use]
    pub fn options_in_effect<'a>(&'a self, kind: &'a QuestionKind) -> Option<&'a [String]> {
        match &self.shuffled {
            Some(order) => Some(&order.options),
            None => kind.options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sba_kind() -> QuestionKind {
        QuestionKind::Sba {
            options: vec!["a".into(), "b".into(), "c".into()],
            correct: 1,
        }
    }

    #[test]
    fn initial_answer_is_type_shaped() {
        let emq = QuestionKind::Emq {
            theme: "T".into(),
            options: vec!["x".into()],
            stems: vec![
                crate::model::question::EmqStem {
                    text: "s".into(),
                    correct: 0,
                    explanation: String::new(),
                },
                crate::model::question::EmqStem {
                    text: "t".into(),
                    correct: 0,
                    explanation: String::new(),
                },
            ],
        };
        assert_eq!(
            Answer::initial_for(&emq),
            Answer::PerStem {
                selections: vec![None, None]
            }
        );
        assert_eq!(Answer::initial_for(&sba_kind()), Answer::None);
    }

    #[test]
    fn record_is_at_most_once() {
        let mut state = QuestionState::initial(&sba_kind());
        state
            .record(AnswerStatus::Correct, Answer::Choice { index: 1 })
            .unwrap();

        let err = state
            .record(AnswerStatus::Incorrect, Answer::Choice { index: 0 })
            .unwrap_err();
        assert_eq!(err, StateError::AlreadyAttempted);
        assert_eq!(state.status, AnswerStatus::Correct);
        assert_eq!(state.answer, Answer::Choice { index: 1 });
    }

    #[test]
    fn strike_toggles() {
        let mut state = QuestionState::initial(&sba_kind());
        assert!(state.toggle_strike(2));
        assert!(state.struck_out.contains(&2));
        assert!(!state.toggle_strike(2));
        assert!(state.struck_out.is_empty());
    }

    #[test]
    fn options_in_effect_prefers_shuffled() {
        let kind = sba_kind();
        let mut state = QuestionState::initial(&kind);
        assert_eq!(state.options_in_effect(&kind).unwrap()[0], "a");

        state.shuffled = Some(ShuffledOrder {
            options: vec!["c".into(), "a".into(), "b".into()],
            correct: ShuffledCorrect::Single(2),
        });
        assert_eq!(state.options_in_effect(&kind).unwrap()[0], "c");
    }
}
