use std::sync::Arc;

use quiz_core::model::Answer;
use quiz_core::scoring::GradeOutcome;
use storage::repository::{SnapshotStore, StorageError, Stores, WeightStore};

use super::engine::{EndReport, SessionEngine};
use super::exam_clock::TickOutcome;
use super::plan::{SessionBuilder, SessionCriteria};
use crate::Clock;
use crate::autosave::Autosave;
use crate::catalog::CatalogService;
use crate::error::SessionError;
use crate::flag_service::FlagService;

/// Result of asking for a session: either a resumed one or a fresh start.
///
/// `report` is set when a resumed exam had already run out of time and was
/// ended on the spot.
#[derive(Debug)]
pub struct ResumeOutcome {
    pub engine: SessionEngine,
    pub resumed: bool,
    pub report: Option<EndReport>,
}

/// Orchestrates session persistence around the pure engine.
///
/// Snapshot writes are best-effort: a failed autosave logs a warning and the
/// session carries on. Flag and weight writes are explicit user-visible
/// operations and do propagate failures.
pub struct SessionWorkflow {
    clock: Clock,
    catalog: CatalogService,
    snapshots: Arc<dyn SnapshotStore>,
    weights: Arc<dyn WeightStore>,
    flags: FlagService,
    autosave: Autosave,
}

impl SessionWorkflow {
    #[must_use]
    pub fn new(clock: Clock, catalog: CatalogService, stores: &Stores) -> Self {
        Self {
            clock,
            catalog,
            snapshots: Arc::clone(&stores.snapshots),
            weights: Arc::clone(&stores.weights),
            flags: FlagService::new(clock, Arc::clone(&stores.flags)),
            autosave: Autosave::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    #[must_use]
    pub fn flags(&self) -> &FlagService {
        &self.flags
    }

    #[must_use]
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Start a fresh session and persist its opening snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when nothing matches the criteria and
    /// `SessionError::Storage` when the weight map cannot be read.
    pub async fn start(&mut self, criteria: &SessionCriteria) -> Result<SessionEngine, SessionError> {
        let weights = self.weights.load_weights().await?;
        let plan = SessionBuilder::new(&self.catalog)
            .with_weights(&weights)
            .build(criteria)?;
        let engine = SessionEngine::start(criteria, plan)?;
        tracing::info!(session = %engine.id(), questions = engine.total(), "session started");

        self.autosave = Autosave::new();
        self.write_snapshot(&engine).await;
        Ok(engine)
    }

    /// Resume the saved session if it matches the criteria, else start
    /// fresh. An unreadable snapshot is treated as absent.
    ///
    /// A resumed exam whose clock already ran out is ended immediately; its
    /// final report rides along in the outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` for snapshot-store connection
    /// failures and whatever a fresh start may return.
    pub async fn resume_or_start(
        &mut self,
        criteria: &SessionCriteria,
    ) -> Result<ResumeOutcome, SessionError> {
        let snapshot = match self.snapshots.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(StorageError::Serialization(err)) => {
                tracing::warn!(%err, "discarding undecodable saved session");
                None
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(snapshot) = snapshot {
            if let Some(mut engine) = SessionEngine::resume(criteria, snapshot, &self.catalog) {
                self.autosave = Autosave::new();
                let report = if engine.time_expired() {
                    Some(self.finish(&mut engine).await?)
                } else {
                    None
                };
                return Ok(ResumeOutcome {
                    engine,
                    resumed: true,
                    report,
                });
            }
        }

        let engine = self.start(criteria).await?;
        Ok(ResumeOutcome {
            engine,
            resumed: false,
            report: None,
        })
    }

    /// Grade the current question, mirror the result into the flag registry
    /// and persist immediately.
    ///
    /// # Errors
    ///
    /// Propagates engine grading errors and flag-store failures.
    pub async fn answer_current(
        &mut self,
        engine: &mut SessionEngine,
        answer: Answer,
    ) -> Result<GradeOutcome, SessionError> {
        let outcome = engine.submit_answer(answer)?;
        if let Some(id) = engine.current_question().id.clone() {
            self.flags.record_status(&id, outcome.status).await?;
        }
        self.write_snapshot(engine).await;
        Ok(outcome)
    }

    /// Jump to a question; the save is debounced.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` for a bad index.
    pub fn navigate(&mut self, engine: &mut SessionEngine, index: usize) -> Result<(), SessionError> {
        engine.navigate(index)?;
        self.autosave.mark_dirty(self.clock.now());
        Ok(())
    }

    /// Move to the next question; the save is debounced.
    pub fn next(&mut self, engine: &mut SessionEngine) {
        engine.next();
        self.autosave.mark_dirty(self.clock.now());
    }

    /// Move to the previous question; the save is debounced.
    pub fn previous(&mut self, engine: &mut SessionEngine) {
        engine.previous();
        self.autosave.mark_dirty(self.clock.now());
    }

    /// Toggle a strike-out marker; the save is debounced.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` for a bad option index.
    pub fn toggle_strike(
        &mut self,
        engine: &mut SessionEngine,
        option_index: usize,
    ) -> Result<bool, SessionError> {
        let struck = engine.toggle_strike(option_index)?;
        self.autosave.mark_dirty(self.clock.now());
        Ok(struck)
    }

    /// Toggle the review flag, mirror it into the registry and persist
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ended` after the session ends and
    /// `SessionError::Storage` when the registry write fails.
    pub async fn toggle_flag(&mut self, engine: &mut SessionEngine) -> Result<bool, SessionError> {
        let toggle = engine.toggle_flag()?;
        let flagged = toggle.flagged;
        self.flags.apply_toggle(&toggle).await?;
        self.write_snapshot(engine).await;
        Ok(flagged)
    }

    /// Flush a debounced save if its window has passed.
    pub async fn poll(&mut self, engine: &SessionEngine) {
        if self.autosave.take_due(self.clock.now()) {
            self.persist(engine).await;
        }
    }

    /// Drive the exam clock one second forward. Every fifth remaining
    /// second forces a snapshot write; expiry ends the session.
    ///
    /// # Errors
    ///
    /// Propagates finish failures when the clock expires.
    pub async fn tick(
        &mut self,
        engine: &mut SessionEngine,
    ) -> Result<Option<EndReport>, SessionError> {
        match engine.tick() {
            TickOutcome::Expired => {
                let report = self.finish(engine).await?;
                Ok(Some(report))
            }
            TickOutcome::Running { autosave_due, .. } => {
                if autosave_due {
                    self.write_snapshot(engine).await;
                } else {
                    self.poll(engine).await;
                }
                Ok(None)
            }
            TickOutcome::Idle => {
                self.poll(engine).await;
                Ok(None)
            }
        }
    }

    /// End the session: apply weak-topic weights, clear the saved slot and
    /// lock out any further save.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ended` when the session already ended, and
    /// `SessionError::Storage` for weight or slot failures.
    pub async fn finish(&mut self, engine: &mut SessionEngine) -> Result<EndReport, SessionError> {
        let report = engine.end()?;
        tracing::info!(
            session = %engine.id(),
            score = report.score,
            possible = report.possible,
            "session ended"
        );

        let mut weights = self.weights.load_weights().await?;
        report.apply_weights(&mut weights);
        self.weights.save_weights(&weights).await?;

        self.autosave.lock();
        self.snapshots.clear_snapshot().await?;
        Ok(report)
    }

    /// Abandon the current session without a report: clear the saved slot
    /// and lock out any further save.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the slot cannot be cleared.
    pub async fn discard(&mut self) -> Result<(), SessionError> {
        self.autosave.lock();
        self.snapshots.clear_snapshot().await?;
        Ok(())
    }

    /// Immediate best-effort snapshot write, skipped once locked.
    async fn write_snapshot(&mut self, engine: &SessionEngine) {
        if self.autosave.force(self.clock.now()) {
            self.persist(engine).await;
        }
    }

    async fn persist(&self, engine: &SessionEngine) {
        if let Err(err) = self.snapshots.save_snapshot(&engine.snapshot()).await {
            tracing::warn!(%err, "session autosave failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::TypeFilter;
    use quiz_core::normalize::RawRecord;
    use quiz_core::time::fixed_clock;
    use storage::repository::{InMemoryStore, SnapshotStore};

    fn raw_sba(id: usize) -> RawRecord {
        serde_json::from_value(serde_json::json!({
            "id": format!("q{id}"),
            "type": "sba",
            "stem": format!("stem {id}"),
            "options": ["A", "B", "C"],
            "correct_answer": 0,
            "topic": "Topic"
        }))
        .unwrap()
    }

    async fn workflow_with(store: &InMemoryStore, count: usize) -> SessionWorkflow {
        let rows = (0..count).map(raw_sba).collect();
        let seeded = InMemoryStore::with_questions(rows);
        let catalog = CatalogService::load(&seeded).await.unwrap();
        SessionWorkflow::new(fixed_clock(), catalog, &Stores::from_in_memory(store.clone()))
    }

    #[tokio::test]
    async fn starting_writes_an_opening_snapshot() {
        let store = InMemoryStore::new();
        let mut workflow = workflow_with(&store, 4).await;
        let criteria = SessionCriteria::practice(TypeFilter::Sba);
        let engine = workflow.start(&criteria).await.unwrap();

        let saved = store.load_snapshot().await.unwrap().unwrap();
        assert_eq!(saved.question_ids.len(), engine.total());
        assert!(!saved.ended);
    }

    #[tokio::test]
    async fn navigation_saves_are_debounced() {
        let store = InMemoryStore::new();
        let mut workflow = workflow_with(&store, 4).await;
        let criteria = SessionCriteria::practice(TypeFilter::Sba);
        let mut engine = workflow.start(&criteria).await.unwrap();

        workflow.navigate(&mut engine, 2).unwrap();
        workflow.poll(&engine).await;
        // Inside the window the old snapshot is still current.
        assert_eq!(store.load_snapshot().await.unwrap().unwrap().current, 0);

        workflow.clock_mut().advance(Duration::milliseconds(600));
        workflow.poll(&engine).await;
        assert_eq!(store.load_snapshot().await.unwrap().unwrap().current, 2);
    }

    #[tokio::test]
    async fn finishing_locks_the_slot_against_resurrection() {
        let store = InMemoryStore::new();
        let mut workflow = workflow_with(&store, 4).await;
        let criteria = SessionCriteria::practice(TypeFilter::Sba);
        let mut engine = workflow.start(&criteria).await.unwrap();

        workflow.finish(&mut engine).await.unwrap();
        assert!(store.load_snapshot().await.unwrap().is_none());

        // A late debounced or immediate save must not bring the slot back.
        workflow.navigate(&mut engine, 1).unwrap();
        workflow.clock_mut().advance(Duration::seconds(2));
        workflow.poll(&engine).await;
        assert!(store.load_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resume_restores_saved_progress() {
        let store = InMemoryStore::new();
        let criteria = SessionCriteria::practice(TypeFilter::Sba);
        {
            let mut workflow = workflow_with(&store, 4).await;
            let mut engine = workflow.start(&criteria).await.unwrap();
            workflow
                .answer_current(&mut engine, Answer::Choice { index: 0 })
                .await
                .unwrap();
        }

        let mut workflow = workflow_with(&store, 4).await;
        let outcome = workflow.resume_or_start(&criteria).await.unwrap();
        assert!(outcome.resumed);
        assert_eq!(outcome.engine.progress().attempted, 1);
        assert!(outcome.report.is_none());
    }

    #[tokio::test]
    async fn mismatched_snapshot_starts_fresh() {
        let store = InMemoryStore::new();
        {
            let mut workflow = workflow_with(&store, 4).await;
            let criteria = SessionCriteria::practice(TypeFilter::Sba);
            workflow.start(&criteria).await.unwrap();
        }

        let mut workflow = workflow_with(&store, 4).await;
        let outcome = workflow
            .resume_or_start(&SessionCriteria::practice(TypeFilter::Mixed))
            .await
            .unwrap();
        assert!(!outcome.resumed);
    }

    #[tokio::test]
    async fn resumed_exam_out_of_time_ends_immediately() {
        let store = InMemoryStore::new();
        let criteria = SessionCriteria::mock_exam(1);
        {
            let mut workflow = workflow_with(&store, 9).await;
            let crit = SessionCriteria {
                selected_type: TypeFilter::Sba,
                ..criteria.clone()
            };
            let mut engine = workflow.start(&crit).await.unwrap();
            engine.set_time_left(Some(0));
            // Persist the exhausted clock.
            workflow
                .toggle_flag(&mut engine)
                .await
                .unwrap();
        }

        let mut workflow = workflow_with(&store, 9).await;
        let crit = SessionCriteria {
            selected_type: TypeFilter::Sba,
            ..criteria
        };
        let outcome = workflow.resume_or_start(&crit).await.unwrap();
        assert!(outcome.resumed);
        assert!(outcome.engine.is_ended());
        assert!(outcome.report.is_some());
        assert!(store.load_snapshot().await.unwrap().is_none());
    }
}
