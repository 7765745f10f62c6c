use thiserror::Error;

use crate::model::{SnapshotError, StateError};
use crate::scoring::ScoreError;

/// Umbrella error for the domain layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}
