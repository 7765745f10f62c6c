use std::sync::Arc;

use storage::repository::Stores;
use storage::sqlite::SqliteStore;

use crate::Clock;
use crate::catalog::CatalogService;
use crate::error::AppServicesError;
use crate::flag_service::FlagService;
use crate::rest_source::RestQuestionSource;
use crate::sessions::SessionWorkflow;

/// Assembles app-facing services over a loaded catalog.
pub struct AppServices {
    clock: Clock,
    stores: Stores,
    catalog: CatalogService,
    flags: Arc<FlagService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, refreshing the local
    /// question cache from the remote source when one is configured.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization, the remote
    /// refresh, or catalog loading fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let store = SqliteStore::connect(db_url).await?;
        store.migrate().await?;

        let source = RestQuestionSource::from_env();
        if source.enabled() {
            let rows = source
                .fetch_all()
                .await
                .map_err(crate::error::CatalogError::Source)?;
            store.replace_questions(&rows).await?;
        }

        let stores = Stores::sqlite(db_url).await?;
        Self::over_stores(clock, stores).await
    }

    /// Build services over an already-assembled store set.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the catalog cannot be loaded.
    pub async fn over_stores(clock: Clock, stores: Stores) -> Result<Self, AppServicesError> {
        let catalog = CatalogService::load(stores.questions.as_ref()).await?;
        let flags = Arc::new(FlagService::new(clock, Arc::clone(&stores.flags)));
        Ok(Self {
            clock,
            stores,
            catalog,
            flags,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    #[must_use]
    pub fn flags(&self) -> Arc<FlagService> {
        Arc::clone(&self.flags)
    }

    /// Fresh workflow for running one session at a time.
    #[must_use]
    pub fn session_workflow(&self) -> SessionWorkflow {
        SessionWorkflow::new(self.clock, self.catalog.clone(), &self.stores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::normalize::RawRecord;
    use quiz_core::time::fixed_clock;
    use storage::repository::InMemoryStore;

    #[tokio::test]
    async fn bootstraps_over_in_memory_stores() {
        let rows: Vec<RawRecord> = vec![
            serde_json::from_value(serde_json::json!({
                "id": "q1",
                "type": "sba",
                "stem": "Pick one",
                "options": ["A", "B"],
                "correct_answer": 1
            }))
            .unwrap(),
        ];
        let stores = Stores::from_in_memory(InMemoryStore::with_questions(rows));
        let services = AppServices::over_stores(fixed_clock(), stores).await.unwrap();
        assert_eq!(services.catalog().len(), 1);
    }
}
