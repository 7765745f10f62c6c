use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;

use crate::repository::{FlagStore, SnapshotStore, StorageError, TopicWeights, WeightStore};
use quiz_core::model::{FlagRegistry, SessionSnapshot};

use super::SqliteStore;

/// Slot key for the in-progress session snapshot.
pub const SNAPSHOT_SLOT: &str = "quiz-state-v3";

/// Slot key for the flagged-question registry.
pub const FLAGS_SLOT: &str = "flagged-questions";

/// Slot key for per-topic failure weights.
pub const WEIGHTS_SLOT: &str = "weak-topics";

impl SqliteStore {
    async fn read_slot<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let row = sqlx::query("SELECT payload FROM slots WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn write_slot<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let payload = serde_json::to_string(value)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        sqlx::query(
            r"
            INSERT INTO slots (key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }

    async fn delete_slot(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM slots WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn load_snapshot(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        self.read_slot(SNAPSHOT_SLOT).await
    }

    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        self.write_slot(SNAPSHOT_SLOT, snapshot).await
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        self.delete_slot(SNAPSHOT_SLOT).await
    }
}

#[async_trait]
impl FlagStore for SqliteStore {
    async fn load_flags(&self) -> Result<FlagRegistry, StorageError> {
        Ok(self.read_slot(FLAGS_SLOT).await?.unwrap_or_default())
    }

    async fn save_flags(&self, registry: &FlagRegistry) -> Result<(), StorageError> {
        self.write_slot(FLAGS_SLOT, registry).await
    }
}

#[async_trait]
impl WeightStore for SqliteStore {
    async fn load_weights(&self) -> Result<TopicWeights, StorageError> {
        Ok(self.read_slot(WEIGHTS_SLOT).await?.unwrap_or_default())
    }

    async fn save_weights(&self, weights: &TopicWeights) -> Result<(), StorageError> {
        self.write_slot(WEIGHTS_SLOT, weights).await
    }
}
