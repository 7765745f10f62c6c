use std::collections::BTreeSet;

use quiz_core::model::{Answer, AnswerStatus, QuestionKind, ReadingLink};

use super::engine::SessionEngine;

/// Presentation-agnostic view of the current question.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no localization assumptions
///
/// Options come in the order in effect for this session, so a UI rendering
/// them never sees the canonical order a shuffle replaced. Explanations are
/// withheld until the question has been attempted or the session is in
/// review.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    /// 1-based position in the working order.
    pub number: usize,
    pub total: usize,
    pub stem: String,
    pub theme: Option<String>,
    pub options: Vec<String>,
    /// EMQ stem texts, empty for other types.
    pub stems: Vec<String>,
    pub unit: Option<String>,
    pub status: AnswerStatus,
    pub answer: Answer,
    pub flagged: bool,
    pub struck_out: BTreeSet<usize>,
    pub explanation: Option<String>,
    pub further_reading: Vec<ReadingLink>,
    pub images: Option<String>,
    pub time_left: Option<i64>,
}

impl QuestionView {
    /// Build the view of the engine's current question.
    #[must_use]
    pub fn of(engine: &SessionEngine) -> Self {
        let question = engine.current_question();
        let state = engine.current_state();

        let (theme, stems, unit) = match &question.kind {
            QuestionKind::Emq { theme, stems, .. } => (
                Some(theme.clone()),
                stems.iter().map(|s| s.text.clone()).collect(),
                None,
            ),
            QuestionKind::Numeric { unit, .. } => (None, Vec::new(), unit.clone()),
            _ => (None, Vec::new(), None),
        };

        let revealed = state.status.is_attempted() || engine.review_mode();
        let explanation = (revealed && !question.explanation.is_empty())
            .then(|| question.explanation.clone());

        Self {
            number: engine.current_index() + 1,
            total: engine.total(),
            stem: question.stem.clone(),
            theme,
            options: state
                .options_in_effect(&question.kind)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            stems,
            unit,
            status: state.status,
            answer: state.answer.clone(),
            flagged: state.flagged,
            struck_out: state.struck_out.clone(),
            explanation,
            further_reading: question.further_reading.clone(),
            images: question.images.clone(),
            time_left: engine.time_left(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::plan::{SessionCriteria, SessionPlan};
    use quiz_core::model::{Question, QuestionId, QuestionState, TypeFilter};

    fn sba_with_explanation() -> Question {
        Question {
            id: QuestionId::new("q1"),
            stem: "Pick one".into(),
            kind: QuestionKind::Sba {
                options: vec!["A".into(), "B".into()],
                correct: 1,
            },
            topic: "Topic".into(),
            topic_id: None,
            category: None,
            explanation: "Because B.".into(),
            further_reading: Vec::new(),
            images: None,
        }
    }

    fn engine_of(questions: Vec<Question>) -> SessionEngine {
        let states = questions
            .iter()
            .map(|q| QuestionState::initial(&q.kind))
            .collect();
        SessionEngine::start(
            &SessionCriteria::practice(TypeFilter::Mixed),
            SessionPlan { questions, states },
        )
        .unwrap()
    }

    #[test]
    fn explanation_is_withheld_until_attempted() {
        let mut engine = engine_of(vec![sba_with_explanation()]);
        let before = QuestionView::of(&engine);
        assert_eq!(before.explanation, None);
        assert_eq!(before.number, 1);
        assert_eq!(before.options, vec!["A".to_owned(), "B".to_owned()]);

        engine
            .submit_answer(Answer::Choice { index: 1 })
            .unwrap();
        let after = QuestionView::of(&engine);
        assert_eq!(after.explanation.as_deref(), Some("Because B."));
        assert_eq!(after.status, AnswerStatus::Correct);
    }

    #[test]
    fn study_mode_reveals_explanations_without_an_attempt() {
        let questions = vec![sba_with_explanation()];
        let states = questions
            .iter()
            .map(|q| QuestionState::initial(&q.kind))
            .collect();
        let engine = SessionEngine::start(
            &SessionCriteria::study(TypeFilter::Mixed),
            SessionPlan { questions, states },
        )
        .unwrap();

        let view = QuestionView::of(&engine);
        assert_eq!(view.explanation.as_deref(), Some("Because B."));
        assert_eq!(view.status, AnswerStatus::NotAttempted);
    }
}
