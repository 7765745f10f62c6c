use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::model::{Question, QuestionId};
use quiz_core::normalize::{self, NormalizedCatalog};
use storage::repository::QuestionRepository;

use crate::error::CatalogError;

/// The normalized question catalog, indexed by persistent id.
///
/// Built once per app start from whatever the question repository returns;
/// skipped records are logged and dropped, never surfaced as errors.
#[derive(Clone)]
pub struct CatalogService {
    questions: Arc<Vec<Question>>,
    by_id: Arc<HashMap<QuestionId, usize>>,
    skipped: usize,
}

impl CatalogService {
    /// Load and normalize the full catalog from a repository.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the repository cannot be read and
    /// `CatalogError::Empty` when nothing usable remains after
    /// normalization.
    pub async fn load(repository: &dyn QuestionRepository) -> Result<Self, CatalogError> {
        let rows = repository.fetch_all().await?;
        let normalized = normalize::normalize_catalog(&rows);
        Self::from_normalized(normalized)
    }

    /// Build a catalog from an already-normalized question set.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Empty` when the set is empty.
    pub fn from_normalized(normalized: NormalizedCatalog) -> Result<Self, CatalogError> {
        for skip in &normalized.skipped {
            tracing::warn!(index = skip.index, reason = %skip.reason, "skipped catalog record");
        }
        if normalized.questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let by_id = normalized
            .questions
            .iter()
            .enumerate()
            .filter_map(|(idx, q)| q.id.clone().map(|id| (id, idx)))
            .collect();

        Ok(Self {
            questions: Arc::new(normalized.questions),
            by_id: Arc::new(by_id),
            skipped: normalized.skipped.len(),
        })
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Number of raw records dropped during normalization.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Look up a question by its persistent id.
    #[must_use]
    pub fn by_id(&self, id: &QuestionId) -> Option<&Question> {
        self.by_id.get(id).map(|&idx| &self.questions[idx])
    }

    /// Whether an id refers to a known catalog question.
    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.by_id.contains_key(id)
    }
}
