use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::question::QuestionType;
use crate::model::state::QuestionState;

//
// ─── SESSION MODE & TYPE FILTER ────────────────────────────────────────────────
//

/// How a session is run: untimed practice or the timed exam simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Practice,
    Exam,
}

/// Which slice of the catalog a session draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    Sba,
    Emq,
    Mba,
    Mixed,
    /// Weighted ordering by persisted weak-topic failure weight.
    Smart,
}

impl TypeFilter {
    /// The question type this filter restricts to, if it is a plain filter.
    #[must_use]
    pub fn question_type(&self) -> Option<QuestionType> {
        match self {
            Self::Sba => Some(QuestionType::Sba),
            Self::Emq => Some(QuestionType::Emq),
            Self::Mba => Some(QuestionType::Mba),
            Self::Mixed | Self::Smart => None,
        }
    }
}

//
// ─── SESSION SNAPSHOT ──────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("question id list ({ids}) does not match state list ({states})")]
    LengthMismatch { ids: usize, states: usize },
}

/// Persisted session progress; one snapshot exists at a time.
///
/// `question_ids` pins the shuffled working order so a resumed session sees
/// the same questions in the same positions. Ids are optional because a
/// normalized question may lack a usable persistent id; such entries can
/// never be matched back to the catalog, which makes the snapshot
/// unresumable by length mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub exam_id: Option<u8>,
    pub selected_type: TypeFilter,
    pub category: Option<String>,
    pub question_ids: Vec<Option<QuestionId>>,
    pub states: Vec<QuestionState>,
    pub current: usize,
    pub time_left: Option<i64>,
    pub total_score: u32,
    pub total_possible: u32,
    pub ended: bool,
    pub review_mode: bool,
}

impl SessionSnapshot {
    /// Structural validation applied on load before any resume check.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::LengthMismatch` when the id and state lists
    /// disagree; such a snapshot is treated as absent.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.question_ids.len() != self.states.len() {
            return Err(SnapshotError::LengthMismatch {
                ids: self.question_ids.len(),
                states: self.states.len(),
            });
        }
        Ok(())
    }
}
