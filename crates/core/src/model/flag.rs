use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ids::QuestionId;
use crate::model::state::AnswerStatus;

/// One entry in the persistent flagged-question registry.
///
/// The registry outlives individual sessions; answering a flagged question
/// in a later session updates `status` in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEntry {
    pub status: AnswerStatus,
    pub flagged_at: DateTime<Utc>,
}

/// The registry document stored in its own keyed slot.
pub type FlagRegistry = BTreeMap<QuestionId, FlagEntry>;
