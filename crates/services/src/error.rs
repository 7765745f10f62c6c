//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{SnapshotError, StateError};
use quiz_core::scoring::ScoreError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `RestQuestionSource`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RestSourceError {
    #[error("remote question source is not configured")]
    Disabled,
    #[error("question source request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog is empty after normalization")]
    Empty,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Source(#[from] RestSourceError),
}

/// Errors emitted by the session engine and its orchestration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions matched the session criteria")]
    Empty,
    #[error("session has ended")]
    Ended,
    #[error("question index {index} out of range ({len} questions)")]
    OutOfRange { index: usize, len: usize },
    #[error("multi-best-answer requires at least {required} selections, got {got}")]
    TooFewSelections { required: usize, got: usize },
    #[error("every stem needs a selection before grading")]
    IncompleteEmq,
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
