//! Grading rules for each question format.
//!
//! Grading is pure: it reads a question's correctness target and a submitted
//! answer and produces a status plus score/possible deltas. Whether the
//! answer may be graded at all (at-most-once) is enforced by
//! [`QuestionState::record`](crate::model::QuestionState::record), not here.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::model::{Answer, AnswerStatus, QuestionKind, ShuffledCorrect};

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Result of grading one submission.
///
/// `possible_delta` is counted at grading time, so a session's running
/// possible total only covers attempted questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub status: AnswerStatus,
    pub score_delta: u32,
    pub possible_delta: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("answer shape does not match question type")]
    AnswerShapeMismatch,
    #[error("EMQ selection count ({got}) does not match stem count ({expected})")]
    StemCountMismatch { expected: usize, got: usize },
}

//
// ─── PER-TYPE GRADERS ──────────────────────────────────────────────────────────
//

/// SBA: exact index match against the correct index in effect.
#[must_use]
pub fn grade_sba(correct: usize, chosen: usize) -> GradeOutcome {
    if chosen == correct {
        GradeOutcome {
            status: AnswerStatus::Correct,
            score_delta: 1,
            possible_delta: 1,
        }
    } else {
        GradeOutcome {
            status: AnswerStatus::Incorrect,
            score_delta: 0,
            possible_delta: 1,
        }
    }
}

/// EMQ: graded per stem, one point each. An unanswered stem counts wrong.
///
/// # Errors
///
/// Returns `ScoreError::StemCountMismatch` when the selection list is not
/// index-aligned with the stems.
pub fn grade_emq(correct: &[usize], selections: &[Option<usize>]) -> Result<GradeOutcome, ScoreError> {
    if correct.len() != selections.len() {
        return Err(ScoreError::StemCountMismatch {
            expected: correct.len(),
            got: selections.len(),
        });
    }
    let total = correct.len();
    let right = correct
        .iter()
        .zip(selections)
        .filter(|(want, got)| **got == Some(**want))
        .count();
    let status = if right == total {
        AnswerStatus::Correct
    } else if right == 0 {
        AnswerStatus::Incorrect
    } else {
        AnswerStatus::Partial
    };
    Ok(GradeOutcome {
        status,
        score_delta: u32::try_from(right).unwrap_or(u32::MAX),
        possible_delta: u32::try_from(total).unwrap_or(u32::MAX),
    })
}

/// MBA: the selected set must equal the correct set exactly. A non-empty
/// overlap short of equality is marked partial but scores nothing.
#[must_use]
pub fn grade_mba(correct: &BTreeSet<usize>, chosen: &BTreeSet<usize>) -> GradeOutcome {
    if chosen == correct {
        return GradeOutcome {
            status: AnswerStatus::Correct,
            score_delta: 1,
            possible_delta: 1,
        };
    }
    let status = if chosen.intersection(correct).next().is_some() {
        AnswerStatus::Partial
    } else {
        AnswerStatus::Incorrect
    };
    GradeOutcome {
        status,
        score_delta: 0,
        possible_delta: 1,
    }
}

/// Numeric: correct when the parsed value falls within the inclusive
/// tolerance band. Input that does not parse as a number still consumes the
/// attempt and grades incorrect.
#[must_use]
pub fn grade_numeric(correct_answer: f64, tolerance: f64, raw: &str) -> GradeOutcome {
    let status = match raw.trim().parse::<f64>() {
        Ok(value) if (value - correct_answer).abs() <= tolerance => AnswerStatus::Correct,
        _ => AnswerStatus::Incorrect,
    };
    GradeOutcome {
        status,
        score_delta: u32::from(status == AnswerStatus::Correct),
        possible_delta: 1,
    }
}

//
// ─── DISPATCH ──────────────────────────────────────────────────────────────────
//

/// Grades an answer against a question, honouring a shuffled correctness
/// remap when one is in effect for the session.
///
/// # Errors
///
/// Returns `ScoreError::AnswerShapeMismatch` when the answer variant does
/// not fit the question type (or the shuffle remap does not), and
/// `ScoreError::StemCountMismatch` for misaligned EMQ selections.
pub fn grade(
    kind: &QuestionKind,
    shuffled: Option<&ShuffledCorrect>,
    answer: &Answer,
) -> Result<GradeOutcome, ScoreError> {
    match (kind, answer) {
        (QuestionKind::Sba { correct, .. }, Answer::Choice { index }) => {
            let correct = match shuffled {
                Some(ShuffledCorrect::Single(remapped)) => *remapped,
                Some(ShuffledCorrect::PerStem(_)) => return Err(ScoreError::AnswerShapeMismatch),
                None => *correct,
            };
            Ok(grade_sba(correct, *index))
        }
        (QuestionKind::Emq { stems, .. }, Answer::PerStem { selections }) => {
            let canonical: Vec<usize> = stems.iter().map(|s| s.correct).collect();
            match shuffled {
                Some(ShuffledCorrect::PerStem(remapped)) => grade_emq(remapped, selections),
                Some(ShuffledCorrect::Single(_)) => Err(ScoreError::AnswerShapeMismatch),
                None => grade_emq(&canonical, selections),
            }
        }
        (QuestionKind::Mba { correct, .. }, Answer::Choices { indices }) => {
            Ok(grade_mba(correct, indices))
        }
        (
            QuestionKind::Numeric {
                correct_answer,
                tolerance,
                ..
            },
            Answer::Text { raw },
        ) => Ok(grade_numeric(*correct_answer, *tolerance, raw)),
        _ => Err(ScoreError::AnswerShapeMismatch),
    }
}
