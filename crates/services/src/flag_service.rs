use std::sync::Arc;

use quiz_core::model::{AnswerStatus, FlagEntry, FlagRegistry, QuestionId};
use storage::repository::FlagStore;

use crate::Clock;
use crate::catalog::CatalogService;
use crate::error::SessionError;
use crate::sessions::FlagToggle;

/// Maintains the cross-session flagged-question registry.
///
/// The registry is keyed by persistent question id; flags raised on
/// questions without a usable id stay session-local and are never mirrored
/// here.
#[derive(Clone)]
pub struct FlagService {
    clock: Clock,
    flags: Arc<dyn FlagStore>,
}

impl FlagService {
    #[must_use]
    pub fn new(clock: Clock, flags: Arc<dyn FlagStore>) -> Self {
        Self { clock, flags }
    }

    /// Load the full registry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list(&self) -> Result<FlagRegistry, SessionError> {
        Ok(self.flags.load_flags().await?)
    }

    /// Mirror an in-session flag toggle into the registry. Toggles on
    /// questions without an id are a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn apply_toggle(&self, toggle: &FlagToggle) -> Result<(), SessionError> {
        let Some(id) = &toggle.id else {
            tracing::debug!("flag toggled on a question without a persistent id");
            return Ok(());
        };
        let mut registry = self.flags.load_flags().await?;
        if toggle.flagged {
            registry.insert(
                id.clone(),
                FlagEntry {
                    status: toggle.status,
                    flagged_at: self.clock.now(),
                },
            );
        } else {
            registry.remove(id);
        }
        self.flags.save_flags(&registry).await?;
        Ok(())
    }

    /// Update the stored grading status of a flagged question after it is
    /// answered in some session. Unflagged ids are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn record_status(
        &self,
        id: &QuestionId,
        status: AnswerStatus,
    ) -> Result<(), SessionError> {
        let mut registry = self.flags.load_flags().await?;
        if let Some(entry) = registry.get_mut(id) {
            entry.status = status;
            self.flags.save_flags(&registry).await?;
        }
        Ok(())
    }

    /// Remove a single entry from the registry. Removing an absent id is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn remove(&self, id: &QuestionId) -> Result<(), SessionError> {
        let mut registry = self.flags.load_flags().await?;
        if registry.remove(id).is_some() {
            self.flags.save_flags(&registry).await?;
        }
        Ok(())
    }

    /// Drop registry entries whose id no longer resolves in the catalog.
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn prune(&self, catalog: &CatalogService) -> Result<usize, SessionError> {
        let mut registry = self.flags.load_flags().await?;
        let before = registry.len();
        registry.retain(|id, _| catalog.contains(id));
        let removed = before - registry.len();
        if removed > 0 {
            tracing::info!(removed, "pruned stale flag entries");
            self.flags.save_flags(&registry).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Question, QuestionKind};
    use quiz_core::normalize::NormalizedCatalog;
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryStore;

    fn service(store: &InMemoryStore) -> FlagService {
        FlagService::new(fixed_clock(), Arc::new(store.clone()))
    }

    fn toggle(id: Option<&str>, flagged: bool) -> FlagToggle {
        FlagToggle {
            id: id.and_then(QuestionId::new),
            flagged,
            status: AnswerStatus::NotAttempted,
        }
    }

    #[tokio::test]
    async fn toggle_inserts_and_removes_entries() {
        let store = InMemoryStore::new();
        let svc = service(&store);

        svc.apply_toggle(&toggle(Some("q1"), true)).await.unwrap();
        let registry = svc.list().await.unwrap();
        let entry = registry.get(&QuestionId::new("q1").unwrap()).unwrap();
        assert_eq!(entry.flagged_at, fixed_now());

        svc.apply_toggle(&toggle(Some("q1"), false)).await.unwrap();
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_without_id_is_a_no_op() {
        let store = InMemoryStore::new();
        let svc = service(&store);
        svc.apply_toggle(&toggle(None, true)).await.unwrap();
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_status_updates_only_flagged_ids() {
        let store = InMemoryStore::new();
        let svc = service(&store);
        svc.apply_toggle(&toggle(Some("q1"), true)).await.unwrap();

        let flagged = QuestionId::new("q1").unwrap();
        let other = QuestionId::new("q2").unwrap();
        svc.record_status(&flagged, AnswerStatus::Correct).await.unwrap();
        svc.record_status(&other, AnswerStatus::Incorrect).await.unwrap();

        let registry = svc.list().await.unwrap();
        assert_eq!(registry.get(&flagged).unwrap().status, AnswerStatus::Correct);
        assert!(!registry.contains_key(&other));
    }

    #[tokio::test]
    async fn remove_drops_one_entry_and_ignores_absent_ids() {
        let store = InMemoryStore::new();
        let svc = service(&store);
        svc.apply_toggle(&toggle(Some("q1"), true)).await.unwrap();
        svc.apply_toggle(&toggle(Some("q2"), true)).await.unwrap();

        svc.remove(&QuestionId::new("q1").unwrap()).await.unwrap();
        svc.remove(&QuestionId::new("missing").unwrap()).await.unwrap();

        let registry = svc.list().await.unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_key(&QuestionId::new("q2").unwrap()));
    }

    #[tokio::test]
    async fn prune_drops_unknown_ids() {
        let store = InMemoryStore::new();
        let svc = service(&store);
        svc.apply_toggle(&toggle(Some("known"), true)).await.unwrap();
        svc.apply_toggle(&toggle(Some("gone"), true)).await.unwrap();

        let catalog = CatalogService::from_normalized(NormalizedCatalog {
            questions: vec![Question {
                id: QuestionId::new("known"),
                stem: "stem".into(),
                kind: QuestionKind::Sba {
                    options: vec!["A".into(), "B".into()],
                    correct: 0,
                },
                topic: "Topic".into(),
                topic_id: None,
                category: None,
                explanation: String::new(),
                further_reading: Vec::new(),
                images: None,
            }],
            skipped: Vec::new(),
        })
        .unwrap();

        assert_eq!(svc.prune(&catalog).await.unwrap(), 1);
        let registry = svc.list().await.unwrap();
        assert!(registry.contains_key(&QuestionId::new("known").unwrap()));
        assert_eq!(registry.len(), 1);
    }
}
