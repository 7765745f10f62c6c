use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{QuestionRepository, StorageError};
use quiz_core::normalize::RawRecord;

use super::SqliteStore;

#[async_trait]
impl QuestionRepository for SqliteStore {
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, StorageError> {
        let rows = sqlx::query("SELECT payload FROM questions ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let payload: String = row
                    .try_get("payload")
                    .map_err(|err| StorageError::Serialization(err.to_string()))?;
                serde_json::from_str(&payload)
                    .map_err(|err| StorageError::Serialization(err.to_string()))
            })
            .collect()
    }
}

impl SqliteStore {
    /// Replace the local question cache with a freshly fetched row set,
    /// preserving fetch order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transaction fails or a row cannot be
    /// encoded.
    pub async fn replace_questions(&self, rows: &[RawRecord]) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        sqlx::query("DELETE FROM questions")
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let fetched_at = Utc::now();
        for row in rows {
            let payload = serde_json::to_string(row)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            sqlx::query("INSERT INTO questions (payload, fetched_at) VALUES (?1, ?2)")
                .bind(payload)
                .bind(fetched_at)
                .execute(&mut *tx)
                .await
                .map_err(|err| StorageError::Connection(err.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        tracing::debug!(rows = rows.len(), "replaced question cache");
        Ok(())
    }
}
