use std::fmt;

use quiz_core::model::{
    Answer, AnswerStatus, Question, QuestionId, QuestionKind, QuestionState, SessionId,
    SessionMode, SessionSnapshot, TypeFilter,
};
use quiz_core::scoring::{self, GradeOutcome};
use storage::repository::TopicWeights;

use super::exam_clock::SECONDS_PER_QUESTION;
use super::plan::{SessionCriteria, SessionPlan};
use crate::catalog::CatalogService;
use crate::error::SessionError;

/// Overall accuracy at or above this fraction earns a distinction mark.
pub const DISTINCTION_THRESHOLD: f64 = 0.8;

/// Per-topic accuracy below this fraction marks the topic weak.
pub const WEAK_TOPIC_THRESHOLD: f64 = 0.7;

/// Minimum selections for a multi-best-answer submission.
pub const MBA_MIN_SELECTIONS: usize = 2;

//
// ─── END REPORT ────────────────────────────────────────────────────────────────
//

/// Per-topic slice of the end-of-session report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBreakdown {
    pub topic: String,
    pub earned: u32,
    pub possible: u32,
}

impl TopicBreakdown {
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.possible == 0 {
            0.0
        } else {
            f64::from(self.earned) / f64::from(self.possible)
        }
    }
}

/// Final results of an ended session.
///
/// `possible` here covers the full question set, so skipped questions count
/// against the final percentage even though the running total only ever
/// covered attempted ones.
#[derive(Debug, Clone, PartialEq)]
pub struct EndReport {
    pub score: u32,
    pub possible: u32,
    pub percentage: f64,
    pub distinction: bool,
    pub topics: Vec<TopicBreakdown>,
}

impl EndReport {
    /// Fold this session's per-topic accuracy into the persistent weight
    /// map: weak topics gain weight, recovered topics lose it, floored at
    /// zero.
    pub fn apply_weights(&self, weights: &mut TopicWeights) {
        for topic in &self.topics {
            let entry = weights.entry(topic.topic.clone()).or_insert(0);
            if topic.accuracy() < WEAK_TOPIC_THRESHOLD {
                *entry += 1;
            } else {
                *entry = entry.saturating_sub(1);
            }
        }
        weights.retain(|_, weight| *weight > 0);
    }
}

/// Result of toggling the flag on the current question, for mirroring into
/// the persistent registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagToggle {
    pub id: Option<QuestionId>,
    pub flagged: bool,
    pub status: AnswerStatus,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one practice or exam session.
///
/// The engine is synchronous and owns no I/O; persistence and timing ticks
/// are driven from the outside.
pub struct SessionEngine {
    id: SessionId,
    mode: SessionMode,
    exam_id: Option<u8>,
    selected_type: TypeFilter,
    category: Option<String>,
    questions: Vec<Question>,
    states: Vec<QuestionState>,
    current: usize,
    time_left: Option<i64>,
    total_score: u32,
    total_possible: u32,
    ended: bool,
    review_mode: bool,
}

impl SessionEngine {
    /// Start a session from a built plan.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty plan.
    pub fn start(criteria: &SessionCriteria, plan: SessionPlan) -> Result<Self, SessionError> {
        if plan.is_empty() {
            return Err(SessionError::Empty);
        }
        let time_left = match criteria.mode {
            SessionMode::Exam => {
                Some(SECONDS_PER_QUESTION * i64::try_from(plan.total()).unwrap_or(i64::MAX))
            }
            SessionMode::Practice => None,
        };
        Ok(Self {
            id: SessionId::generate(),
            mode: criteria.mode,
            exam_id: criteria.exam_id,
            selected_type: criteria.selected_type,
            category: criteria.category.clone(),
            questions: plan.questions,
            states: plan.states,
            current: 0,
            time_left,
            total_score: 0,
            total_possible: 0,
            ended: false,
            review_mode: criteria.study,
        })
    }

    /// Rebuild a session from a saved snapshot, or decline.
    ///
    /// A snapshot is declined when it fails structural validation, belongs
    /// to different criteria, has already ended, or any saved question id no
    /// longer resolves against the catalog. Declining is not an error; the
    /// caller starts fresh.
    #[must_use]
    pub fn resume(
        criteria: &SessionCriteria,
        snapshot: SessionSnapshot,
        catalog: &CatalogService,
    ) -> Option<Self> {
        if let Err(err) = snapshot.validate() {
            tracing::warn!(%err, "discarding saved session");
            return None;
        }
        if !criteria.accepts(&snapshot) {
            tracing::debug!("saved session does not match requested criteria");
            return None;
        }

        let mut questions = Vec::with_capacity(snapshot.question_ids.len());
        for id in &snapshot.question_ids {
            let question = id.as_ref().and_then(|id| catalog.by_id(id))?;
            questions.push(question.clone());
        }
        if questions.is_empty() {
            return None;
        }
        let current = snapshot.current.min(questions.len() - 1);

        Some(Self {
            // The saved session gets a fresh run id; only progress persists.
            id: SessionId::generate(),
            mode: snapshot.mode,
            exam_id: snapshot.exam_id,
            selected_type: snapshot.selected_type,
            category: snapshot.category,
            questions,
            states: snapshot.states,
            current,
            time_left: snapshot.time_left,
            total_score: snapshot.total_score,
            total_possible: snapshot.total_possible,
            ended: snapshot.ended,
            review_mode: snapshot.review_mode,
        })
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────
    //

    /// Run identifier, fresh for every start and resume.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    #[must_use]
    pub fn review_mode(&self) -> bool {
        self.review_mode
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn time_left(&self) -> Option<i64> {
        self.time_left
    }

    pub(crate) fn set_time_left(&mut self, time_left: Option<i64>) {
        self.time_left = time_left;
    }

    /// Running totals over attempted questions: (score, possible).
    #[must_use]
    pub fn totals(&self) -> (u32, u32) {
        (self.total_score, self.total_possible)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn states(&self) -> &[QuestionState] {
        &self.states
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn current_state(&self) -> &QuestionState {
        &self.states[self.current]
    }

    /// Whether an exam clock has run out.
    #[must_use]
    pub fn time_expired(&self) -> bool {
        matches!(self.time_left, Some(remaining) if remaining <= 0)
    }

    //
    // ─── OPERATIONS ────────────────────────────────────────────────────────
    //

    /// Grade and record an answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ended` after the session ends,
    /// `SessionError::TooFewSelections` for an underfilled MBA submission,
    /// `SessionError::IncompleteEmq` when an EMQ stem has no selection,
    /// `SessionError::State` when the question was already attempted, and
    /// `SessionError::Score` for an answer that does not fit the question.
    pub fn submit_answer(&mut self, answer: Answer) -> Result<GradeOutcome, SessionError> {
        if self.ended {
            return Err(SessionError::Ended);
        }
        let question = &self.questions[self.current];
        let state = &mut self.states[self.current];

        if matches!(question.kind, QuestionKind::Mba { .. }) {
            if let Answer::Choices { indices } = &answer {
                if indices.len() < MBA_MIN_SELECTIONS {
                    return Err(SessionError::TooFewSelections {
                        required: MBA_MIN_SELECTIONS,
                        got: indices.len(),
                    });
                }
            }
        }
        if matches!(question.kind, QuestionKind::Emq { .. }) {
            if let Answer::PerStem { selections } = &answer {
                if selections.iter().any(Option::is_none) {
                    return Err(SessionError::IncompleteEmq);
                }
            }
        }
        if state.status.is_attempted() {
            return Err(quiz_core::model::StateError::AlreadyAttempted.into());
        }

        let remap = state.shuffled.as_ref().map(|order| &order.correct);
        let outcome = scoring::grade(&question.kind, remap, &answer)?;
        state.record(outcome.status, answer)?;

        self.total_score += outcome.score_delta;
        self.total_possible += outcome.possible_delta;
        Ok(outcome)
    }

    /// Jump to a question by index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` for an index past the end.
    pub fn navigate(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.questions.len() {
            return Err(SessionError::OutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    /// Move to the next question, clamping at the last.
    pub fn next(&mut self) {
        if self.current + 1 < self.questions.len() {
            self.current += 1;
        }
    }

    /// Move to the previous question, clamping at the first.
    pub fn previous(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    /// Toggle the review flag on the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ended` after the session ends; the persistent
    /// registry is then managed directly, not through session state.
    pub fn toggle_flag(&mut self) -> Result<FlagToggle, SessionError> {
        if self.ended {
            return Err(SessionError::Ended);
        }
        let state = &mut self.states[self.current];
        state.flagged = !state.flagged;
        Ok(FlagToggle {
            id: self.questions[self.current].id.clone(),
            flagged: state.flagged,
            status: state.status,
        })
    }

    /// Toggle a strike-out marker on an option of the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` for an option index past the list
    /// in effect.
    pub fn toggle_strike(&mut self, option_index: usize) -> Result<bool, SessionError> {
        let question = &self.questions[self.current];
        let state = &mut self.states[self.current];
        let len = state
            .options_in_effect(&question.kind)
            .map_or(0, <[String]>::len);
        if option_index >= len {
            return Err(SessionError::OutOfRange {
                index: option_index,
                len,
            });
        }
        Ok(state.toggle_strike(option_index))
    }

    /// End the session and produce the final report.
    ///
    /// The report's possible total covers every question in the working set,
    /// attempted or not, and the per-topic breakdown drives the weak-topic
    /// weight update.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ended` when called twice.
    pub fn end(&mut self) -> Result<EndReport, SessionError> {
        if self.ended {
            return Err(SessionError::Ended);
        }
        self.ended = true;
        self.review_mode = true;

        let mut score = 0_u32;
        let mut possible = 0_u32;
        let mut topics: Vec<TopicBreakdown> = Vec::new();

        for (question, state) in self.questions.iter().zip(&self.states) {
            let units = question.kind.possible_units();
            let earned = earned_units(question, state);
            score += earned;
            possible += units;

            let label = question.topic_label();
            match topics.iter_mut().find(|t| t.topic == label) {
                Some(entry) => {
                    entry.earned += earned;
                    entry.possible += units;
                }
                None => topics.push(TopicBreakdown {
                    topic: label.to_owned(),
                    earned,
                    possible: units,
                }),
            }
        }

        let percentage = if possible == 0 {
            0.0
        } else {
            f64::from(score) / f64::from(possible)
        };

        Ok(EndReport {
            score,
            possible,
            percentage,
            distinction: percentage >= DISTINCTION_THRESHOLD,
            topics,
        })
    }

    /// Serialize the live session for persistence.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            exam_id: self.exam_id,
            selected_type: self.selected_type,
            category: self.category.clone(),
            question_ids: self.questions.iter().map(|q| q.id.clone()).collect(),
            states: self.states.clone(),
            current: self.current,
            time_left: self.time_left,
            total_score: self.total_score,
            total_possible: self.total_possible,
            ended: self.ended,
            review_mode: self.review_mode,
        }
    }
}

/// Score units a recorded state is worth, recomputed from the stored answer.
fn earned_units(question: &Question, state: &QuestionState) -> u32 {
    if !state.status.is_attempted() {
        return 0;
    }
    let remap = state.shuffled.as_ref().map(|order| &order.correct);
    scoring::grade(&question.kind, remap, &state.answer)
        .map(|outcome| outcome.score_delta)
        .unwrap_or(0)
}

impl fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEngine")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("total_score", &self.total_score)
            .field("total_possible", &self.total_possible)
            .field("ended", &self.ended)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
