use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{
    Question, QuestionKind, QuestionState, SessionMode, SessionSnapshot, ShuffledCorrect,
    ShuffledOrder, TypeFilter,
};
use storage::repository::TopicWeights;

use crate::catalog::CatalogService;
use crate::error::SessionError;

/// Number of fixed mock exam papers carved out of the catalog.
pub const MOCK_EXAM_COUNT: u8 = 3;

/// Questions per mock exam paper.
pub const MOCK_EXAM_LENGTH: usize = 20;

/// Cap on a smart-revision session.
pub const SMART_REVISION_LIMIT: usize = 20;

//
// ─── CRITERIA ──────────────────────────────────────────────────────────────────
//

/// What the user asked for when starting a session. Also the key a saved
/// snapshot must match before it is offered for resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCriteria {
    pub mode: SessionMode,
    pub selected_type: TypeFilter,
    pub category: Option<String>,
    pub topic_id: Option<String>,
    pub exam_id: Option<u8>,
    pub length: Option<usize>,
    /// Study mode: the session opens in review, explanations visible
    /// without an attempt.
    pub study: bool,
}

impl SessionCriteria {
    #[must_use]
    pub fn practice(selected_type: TypeFilter) -> Self {
        Self {
            mode: SessionMode::Practice,
            selected_type,
            category: None,
            topic_id: None,
            exam_id: None,
            length: None,
            study: false,
        }
    }

    #[must_use]
    pub fn study(selected_type: TypeFilter) -> Self {
        Self {
            study: true,
            ..Self::practice(selected_type)
        }
    }

    #[must_use]
    pub fn mock_exam(exam_id: u8) -> Self {
        Self {
            mode: SessionMode::Exam,
            selected_type: TypeFilter::Mixed,
            category: None,
            topic_id: None,
            exam_id: Some(exam_id),
            length: None,
            study: false,
        }
    }

    /// Whether a saved snapshot belongs to this criteria and may be resumed.
    #[must_use]
    pub fn accepts(&self, snapshot: &SessionSnapshot) -> bool {
        !snapshot.ended
            && snapshot.mode == self.mode
            && snapshot.exam_id == self.exam_id
            && snapshot.selected_type == self.selected_type
            && snapshot.category == self.category
            && snapshot.review_mode == self.study
    }
}

//
// ─── PLAN ──────────────────────────────────────────────────────────────────────
//

/// Selection result for a session build: the working question order plus
/// fresh per-question state carrying any shuffled option layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub questions: Vec<Question>,
    pub states: Vec<QuestionState>,
}

impl SessionPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Builds a session plan from the catalog according to criteria.
pub struct SessionBuilder<'a> {
    catalog: &'a CatalogService,
    weights: Option<&'a TopicWeights>,
}

impl<'a> SessionBuilder<'a> {
    #[must_use]
    pub fn new(catalog: &'a CatalogService) -> Self {
        Self {
            catalog,
            weights: None,
        }
    }

    /// Provide persisted topic weights, required for smart revision.
    #[must_use]
    pub fn with_weights(mut self, weights: &'a TopicWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Build a plan using thread-local randomness.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when nothing matches the criteria.
    pub fn build(&self, criteria: &SessionCriteria) -> Result<SessionPlan, SessionError> {
        self.build_with_rng(criteria, &mut rng())
    }

    /// Build a plan with an injected random source.
    ///
    /// Mock exam papers and smart revision are deterministic in membership;
    /// presentation order is always shuffled, as is option order for SBA
    /// and EMQ questions, with correctness indices remapped into the
    /// per-question state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when nothing matches the criteria.
    pub fn build_with_rng<R: Rng + ?Sized>(
        &self,
        criteria: &SessionCriteria,
        rng: &mut R,
    ) -> Result<SessionPlan, SessionError> {
        let mut pool: Vec<&Question> = self
            .catalog
            .questions()
            .iter()
            .filter(|q| match &criteria.category {
                Some(cat) => q.category.as_deref() == Some(cat.as_str()),
                None => true,
            })
            .filter(|q| match &criteria.topic_id {
                Some(topic_id) => q.topic_id.as_deref() == Some(topic_id.as_str()),
                None => true,
            })
            .filter(|q| match criteria.selected_type.question_type() {
                Some(qtype) => q.question_type() == qtype,
                None => true,
            })
            .collect();

        if criteria.selected_type == TypeFilter::Smart {
            let weights = self.weights;
            let weight_of =
                |q: &Question| weights.and_then(|w| w.get(q.topic_label())).copied().unwrap_or(0);
            // Stable sort keeps catalog order within equal weights, so an
            // empty weight map degrades to the leading catalog slice.
            pool.sort_by_key(|q| std::cmp::Reverse(weight_of(q)));
            pool.truncate(SMART_REVISION_LIMIT);
        } else if let Some(exam_id) = criteria.exam_id {
            // Fixed paper: every third question belongs to one of the three
            // papers, so the same paper always contains the same questions.
            let offset = usize::from(exam_id.saturating_sub(1)) % usize::from(MOCK_EXAM_COUNT);
            pool = pool
                .into_iter()
                .enumerate()
                .filter(|(idx, _)| idx % usize::from(MOCK_EXAM_COUNT) == offset)
                .map(|(_, q)| q)
                .take(MOCK_EXAM_LENGTH)
                .collect();
        } else if let Some(length) = criteria.length {
            // A random subset: shuffle before cutting.
            pool.shuffle(rng);
            pool.truncate(length);
        }

        if pool.is_empty() {
            return Err(SessionError::Empty);
        }

        // Selection fixes membership; presentation order is always shuffled.
        pool.shuffle(rng);

        let questions: Vec<Question> = pool.into_iter().cloned().collect();
        let states = questions
            .iter()
            .map(|q| shuffled_state(q, rng))
            .collect();

        Ok(SessionPlan { questions, states })
    }
}

//
// ─── OPTION SHUFFLING ──────────────────────────────────────────────────────────
//

/// Fresh state for a question, with options shuffled and correctness
/// remapped for SBA and EMQ. MBA options keep their order so selected index
/// sets compare directly against the canonical correct set; numeric
/// questions have no options.
fn shuffled_state<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> QuestionState {
    let mut state = QuestionState::initial(&question.kind);
    match &question.kind {
        QuestionKind::Sba { options, correct } => {
            let perm = permutation(options.len(), rng);
            let remapped = position_of(&perm, *correct);
            state.shuffled = Some(ShuffledOrder {
                options: reorder(options, &perm),
                correct: ShuffledCorrect::Single(remapped),
            });
        }
        QuestionKind::Emq { options, stems, .. } => {
            let perm = permutation(options.len(), rng);
            let remapped = stems.iter().map(|s| position_of(&perm, s.correct)).collect();
            state.shuffled = Some(ShuffledOrder {
                options: reorder(options, &perm),
                correct: ShuffledCorrect::PerStem(remapped),
            });
        }
        QuestionKind::Mba { .. } | QuestionKind::Numeric { .. } => {}
    }
    state
}

/// A random permutation as a lookup: slot `i` shows original index `perm[i]`.
fn permutation<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..len).collect();
    perm.shuffle(rng);
    perm
}

fn reorder(options: &[String], perm: &[usize]) -> Vec<String> {
    perm.iter().map(|&orig| options[orig].clone()).collect()
}

fn position_of(perm: &[usize], original: usize) -> usize {
    perm.iter().position(|&p| p == original).unwrap_or(original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionId;
    use quiz_core::normalize::NormalizedCatalog;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sba(id: &str, topic: &str, correct: usize) -> Question {
        Question {
            id: QuestionId::new(id),
            stem: format!("stem {id}"),
            kind: QuestionKind::Sba {
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct,
            },
            topic: topic.into(),
            topic_id: None,
            category: Some("Medicine".into()),
            explanation: String::new(),
            further_reading: Vec::new(),
            images: None,
        }
    }

    fn catalog_of(questions: Vec<Question>) -> CatalogService {
        CatalogService::from_normalized(NormalizedCatalog {
            questions,
            skipped: Vec::new(),
        })
        .unwrap()
    }

    fn big_catalog(n: usize) -> CatalogService {
        catalog_of((0..n).map(|i| sba(&format!("q{i}"), "Topic", i % 4)).collect())
    }

    fn sorted_ids(plan: &SessionPlan) -> Vec<Option<QuestionId>> {
        let mut ids: Vec<_> = plan.questions.iter().map(|q| q.id.clone()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn mock_paper_membership_is_deterministic_and_capped() {
        let catalog = big_catalog(90);
        let criteria = SessionCriteria::mock_exam(2);

        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(99);
        let builder = SessionBuilder::new(&catalog);
        let a = builder.build_with_rng(&criteria, &mut rng_a).unwrap();
        let b = builder.build_with_rng(&criteria, &mut rng_b).unwrap();

        assert_eq!(a.total(), MOCK_EXAM_LENGTH);
        // Paper membership does not depend on the random source; the order
        // each sitting presents it in does.
        assert_eq!(sorted_ids(&a), sorted_ids(&b));
        // Paper 2 holds the second residue class of the catalog order.
        for idx in 0..MOCK_EXAM_LENGTH {
            let expected = QuestionId::new(format!("q{}", idx * 3 + 1));
            assert!(a.questions.iter().any(|q| q.id == expected));
        }
    }

    #[test]
    fn different_papers_do_not_overlap() {
        let catalog = big_catalog(90);
        let builder = SessionBuilder::new(&catalog);
        let mut rng = StdRng::seed_from_u64(1);
        let one = builder
            .build_with_rng(&SessionCriteria::mock_exam(1), &mut rng)
            .unwrap();
        let two = builder
            .build_with_rng(&SessionCriteria::mock_exam(2), &mut rng)
            .unwrap();

        for q in &one.questions {
            assert!(two.questions.iter().all(|other| other.id != q.id));
        }
    }

    #[test]
    fn practice_shuffles_but_preserves_membership() {
        let catalog = big_catalog(30);
        let criteria = SessionCriteria::practice(TypeFilter::Sba);
        let mut rng = StdRng::seed_from_u64(5);
        let plan = SessionBuilder::new(&catalog)
            .build_with_rng(&criteria, &mut rng)
            .unwrap();

        assert_eq!(plan.total(), 30);
        let mut ids: Vec<_> = plan.questions.iter().map(|q| q.id.clone()).collect();
        ids.sort();
        let mut expected: Vec<_> = catalog.questions().iter().map(|q| q.id.clone()).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn smart_revision_selects_the_heaviest_topics_first() {
        // 25 weighted questions and 10 unweighted ones: the 20-question cap
        // must be filled from the weighted topic alone.
        let mut questions: Vec<Question> =
            (0..25).map(|i| sba(&format!("w{i}"), "Cardio", i % 4)).collect();
        questions.extend((0..10).map(|i| sba(&format!("z{i}"), "Neuro", i % 4)));
        let catalog = catalog_of(questions);
        let mut weights = TopicWeights::new();
        weights.insert("Cardio".into(), 5);

        let criteria = SessionCriteria::practice(TypeFilter::Smart);
        let mut rng = StdRng::seed_from_u64(3);
        let plan = SessionBuilder::new(&catalog)
            .with_weights(&weights)
            .build_with_rng(&criteria, &mut rng)
            .unwrap();

        assert_eq!(plan.total(), SMART_REVISION_LIMIT);
        assert!(plan.questions.iter().all(|q| q.topic == "Cardio"));
    }

    #[test]
    fn smart_revision_with_no_weights_covers_the_catalog() {
        // No weights recorded yet: smart revision degrades to the leading
        // catalog slice rather than refusing to start.
        let catalog = big_catalog(40);
        let weights = TopicWeights::new();
        let criteria = SessionCriteria::practice(TypeFilter::Smart);
        let mut rng = StdRng::seed_from_u64(7);
        let plan = SessionBuilder::new(&catalog)
            .with_weights(&weights)
            .build_with_rng(&criteria, &mut rng)
            .unwrap();

        assert_eq!(plan.total(), SMART_REVISION_LIMIT);
        let expected: Vec<_> = (0..SMART_REVISION_LIMIT)
            .map(|i| QuestionId::new(format!("q{i}")))
            .collect();
        let mut expected = expected;
        expected.sort();
        assert_eq!(sorted_ids(&plan), expected);
    }

    #[test]
    fn sba_shuffle_remaps_correct_index() {
        let catalog = big_catalog(12);
        let criteria = SessionCriteria::practice(TypeFilter::Sba);
        let mut rng = StdRng::seed_from_u64(11);
        let plan = SessionBuilder::new(&catalog)
            .build_with_rng(&criteria, &mut rng)
            .unwrap();

        for (q, state) in plan.questions.iter().zip(&plan.states) {
            let QuestionKind::Sba { options, correct } = &q.kind else {
                panic!("expected SBA");
            };
            let Some(order) = &state.shuffled else {
                panic!("SBA must carry a shuffled order");
            };
            let ShuffledCorrect::Single(remapped) = order.correct else {
                panic!("SBA remap must be single");
            };
            // The shuffled slot the remap points at holds the same option
            // text the canonical correct index does.
            assert_eq!(order.options[remapped], options[*correct]);
            let mut sorted = order.options.clone();
            sorted.sort();
            let mut expected = options.clone();
            expected.sort();
            assert_eq!(sorted, expected);
        }
    }

    #[test]
    fn criteria_accepts_matching_unended_snapshot() {
        let criteria = SessionCriteria::mock_exam(1);
        let kind = QuestionKind::Sba {
            options: vec!["A".into(), "B".into()],
            correct: 0,
        };
        let mut snapshot = SessionSnapshot {
            mode: SessionMode::Exam,
            exam_id: Some(1),
            selected_type: TypeFilter::Mixed,
            category: None,
            question_ids: vec![QuestionId::new("q0")],
            states: vec![QuestionState::initial(&kind)],
            current: 0,
            time_left: Some(60),
            total_score: 0,
            total_possible: 0,
            ended: false,
            review_mode: false,
        };
        assert!(criteria.accepts(&snapshot));

        snapshot.ended = true;
        assert!(!criteria.accepts(&snapshot));

        snapshot.ended = false;
        snapshot.exam_id = Some(2);
        assert!(!criteria.accepts(&snapshot));
    }

    #[test]
    fn study_snapshots_only_resume_under_study_criteria() {
        let kind = QuestionKind::Sba {
            options: vec!["A".into(), "B".into()],
            correct: 0,
        };
        let snapshot = SessionSnapshot {
            mode: SessionMode::Practice,
            exam_id: None,
            selected_type: TypeFilter::Sba,
            category: None,
            question_ids: vec![QuestionId::new("q0")],
            states: vec![QuestionState::initial(&kind)],
            current: 0,
            time_left: None,
            total_score: 0,
            total_possible: 0,
            ended: false,
            review_mode: true,
        };
        assert!(SessionCriteria::study(TypeFilter::Sba).accepts(&snapshot));
        assert!(!SessionCriteria::practice(TypeFilter::Sba).accepts(&snapshot));
    }
}
