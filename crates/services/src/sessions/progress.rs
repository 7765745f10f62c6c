use quiz_core::model::AnswerStatus;

use super::engine::SessionEngine;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub attempted: usize,
    pub remaining: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub partial: usize,
    pub flagged: usize,
    pub is_ended: bool,
}

impl SessionEngine {
    /// Snapshot the per-status counts for display.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let mut progress = SessionProgress {
            total: self.total(),
            attempted: 0,
            remaining: 0,
            correct: 0,
            incorrect: 0,
            partial: 0,
            flagged: 0,
            is_ended: self.is_ended(),
        };
        for state in self.states() {
            match state.status {
                AnswerStatus::NotAttempted => {}
                AnswerStatus::Correct => progress.correct += 1,
                AnswerStatus::Incorrect => progress.incorrect += 1,
                AnswerStatus::Partial => progress.partial += 1,
            }
            if state.status.is_attempted() {
                progress.attempted += 1;
            }
            if state.flagged {
                progress.flagged += 1;
            }
        }
        progress.remaining = progress.total - progress.attempted;
        progress
    }
}
