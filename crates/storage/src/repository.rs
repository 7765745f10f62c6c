use async_trait::async_trait;
use quiz_core::model::{FlagRegistry, SessionSnapshot};
use quiz_core::normalize::RawRecord;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Per-topic failure weights driving smart-revision ordering.
pub type TopicWeights = BTreeMap<String, u32>;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Source of raw catalog rows. Rows come back untyped; normalization is the
/// domain layer's job.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Fetch every raw question row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, StorageError>;
}

/// Keyed slot holding the single in-progress session snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the saved snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn load_snapshot(&self) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Replace the saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError>;

    /// Remove the saved snapshot. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn clear_snapshot(&self) -> Result<(), StorageError>;
}

/// Keyed slot holding the cross-session flagged-question registry.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Load the registry; an empty slot reads as an empty registry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn load_flags(&self) -> Result<FlagRegistry, StorageError>;

    /// Replace the registry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn save_flags(&self, registry: &FlagRegistry) -> Result<(), StorageError>;
}

/// Keyed slot holding per-topic failure weights.
#[async_trait]
pub trait WeightStore: Send + Sync {
    /// Load the weight map; an empty slot reads as an empty map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failure.
    async fn load_weights(&self) -> Result<TopicWeights, StorageError>;

    /// Replace the weight map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn save_weights(&self, weights: &TopicWeights) -> Result<(), StorageError>;
}

/// In-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    questions: Arc<Mutex<Vec<RawRecord>>>,
    snapshot: Arc<Mutex<Option<SessionSnapshot>>>,
    flags: Arc<Mutex<FlagRegistry>>,
    weights: Arc<Mutex<TopicWeights>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_questions(rows: Vec<RawRecord>) -> Self {
        Self {
            questions: Arc::new(Mutex::new(rows)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl QuestionRepository for InMemoryStore {
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn load_snapshot(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[async_trait]
impl FlagStore for InMemoryStore {
    async fn load_flags(&self) -> Result<FlagRegistry, StorageError> {
        let guard = self
            .flags
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_flags(&self, registry: &FlagRegistry) -> Result<(), StorageError> {
        let mut guard = self
            .flags
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = registry.clone();
        Ok(())
    }
}

#[async_trait]
impl WeightStore for InMemoryStore {
    async fn load_weights(&self) -> Result<TopicWeights, StorageError> {
        let guard = self
            .weights
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_weights(&self, weights: &TopicWeights) -> Result<(), StorageError> {
        let mut guard = self
            .weights
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = weights.clone();
        Ok(())
    }
}

/// Aggregates the four stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Stores {
    pub questions: Arc<dyn QuestionRepository>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub flags: Arc<dyn FlagStore>,
    pub weights: Arc<dyn WeightStore>,
}

impl Stores {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryStore::new())
    }

    #[must_use]
    pub fn from_in_memory(store: InMemoryStore) -> Self {
        let questions: Arc<dyn QuestionRepository> = Arc::new(store.clone());
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(store.clone());
        let flags: Arc<dyn FlagStore> = Arc::new(store.clone());
        let weights: Arc<dyn WeightStore> = Arc::new(store);
        Self {
            questions,
            snapshots,
            flags,
            weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        QuestionId, QuestionKind, QuestionState, SessionMode, SessionSnapshot, TypeFilter,
    };

    fn build_snapshot() -> SessionSnapshot {
        let kind = QuestionKind::Sba {
            options: vec!["a".into(), "b".into()],
            correct: 0,
        };
        SessionSnapshot {
            mode: SessionMode::Practice,
            exam_id: None,
            selected_type: TypeFilter::Sba,
            category: None,
            question_ids: vec![QuestionId::new("q1")],
            states: vec![QuestionState::initial(&kind)],
            current: 0,
            time_left: None,
            total_score: 0,
            total_possible: 0,
            ended: false,
            review_mode: false,
        }
    }

    #[tokio::test]
    async fn snapshot_slot_round_trips_and_clears() {
        let store = InMemoryStore::new();
        assert!(store.load_snapshot().await.unwrap().is_none());

        let snap = build_snapshot();
        store.save_snapshot(&snap).await.unwrap();
        assert_eq!(store.load_snapshot().await.unwrap(), Some(snap));

        store.clear_snapshot().await.unwrap();
        assert!(store.load_snapshot().await.unwrap().is_none());
        // clearing again is a no-op
        store.clear_snapshot().await.unwrap();
    }

    #[tokio::test]
    async fn weights_default_to_empty() {
        let store = InMemoryStore::new();
        assert!(store.load_weights().await.unwrap().is_empty());

        let mut weights = TopicWeights::new();
        weights.insert("Cardiology".into(), 3);
        store.save_weights(&weights).await.unwrap();
        assert_eq!(store.load_weights().await.unwrap(), weights);
    }
}
