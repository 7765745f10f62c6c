use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ids::QuestionId;

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// The four supported question formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Sba,
    Emq,
    Mba,
    Numeric,
}

impl QuestionType {
    /// Parses a lowercased type tag from the catalog.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "sba" => Some(Self::Sba),
            "emq" => Some(Self::Emq),
            "mba" => Some(Self::Mba),
            "numeric" => Some(Self::Numeric),
            _ => None,
        }
    }
}

/// One sub-item of an extended matching question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmqStem {
    pub text: String,
    pub correct: usize,
    pub explanation: String,
}

/// A further-reading link attached to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingLink {
    pub text: String,
    pub url: String,
}

impl ReadingLink {
    /// Returns true when the link target parses as an absolute URL.
    #[must_use]
    pub fn has_valid_url(&self) -> bool {
        url::Url::parse(&self.url).is_ok()
    }
}

/// Type-specific payload of a normalized question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    Sba {
        options: Vec<String>,
        correct: usize,
    },
    Emq {
        theme: String,
        options: Vec<String>,
        stems: Vec<EmqStem>,
    },
    Mba {
        options: Vec<String>,
        correct: BTreeSet<usize>,
    },
    Numeric {
        correct_answer: f64,
        tolerance: f64,
        unit: Option<String>,
    },
}

impl QuestionKind {
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Sba { .. } => QuestionType::Sba,
            Self::Emq { .. } => QuestionType::Emq,
            Self::Mba { .. } => QuestionType::Mba,
            Self::Numeric { .. } => QuestionType::Numeric,
        }
    }

    /// Shared option list for choice-based questions, if any.
    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::Sba { options, .. } | Self::Emq { options, .. } | Self::Mba { options, .. } => {
                Some(options)
            }
            Self::Numeric { .. } => None,
        }
    }

    /// Number of scoring units this question contributes: one per EMQ stem,
    /// one for every other type.
    #[must_use]
    pub fn possible_units(&self) -> u32 {
        match self {
            Self::Emq { stems, .. } => u32::try_from(stems.len()).unwrap_or(u32::MAX),
            _ => 1,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A catalog question, immutable once normalized.
///
/// `id` is `None` for records whose raw id was missing or unusable; such
/// questions can still be practiced but cannot be flagged for review or
/// matched back from a persisted session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Option<QuestionId>,
    pub stem: String,
    pub kind: QuestionKind,
    pub topic: String,
    pub topic_id: Option<String>,
    pub category: Option<String>,
    pub explanation: String,
    pub further_reading: Vec<ReadingLink>,
    pub images: Option<String>,
}

impl Question {
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    /// Topic label used for per-topic aggregation, defaulting unlabelled
    /// questions into a shared bucket.
    #[must_use]
    pub fn topic_label(&self) -> &str {
        if self.topic.is_empty() {
            "General"
        } else {
            &self.topic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sba(options: &[&str], correct: usize) -> QuestionKind {
        QuestionKind::Sba {
            options: options.iter().map(ToString::to_string).collect(),
            correct,
        }
    }

    #[test]
    fn type_tag_parses_case_insensitively() {
        assert_eq!(QuestionType::parse("SBA"), Some(QuestionType::Sba));
        assert_eq!(QuestionType::parse(" emq "), Some(QuestionType::Emq));
        assert_eq!(QuestionType::parse("essay"), None);
    }

    #[test]
    fn emq_counts_one_unit_per_stem() {
        let kind = QuestionKind::Emq {
            theme: "Theme".into(),
            options: vec!["A".into(), "B".into()],
            stems: vec![
                EmqStem {
                    text: "s1".into(),
                    correct: 0,
                    explanation: String::new(),
                },
                EmqStem {
                    text: "s2".into(),
                    correct: 1,
                    explanation: String::new(),
                },
            ],
        };
        assert_eq!(kind.possible_units(), 2);
        assert_eq!(sba(&["a", "b"], 0).possible_units(), 1);
    }

    #[test]
    fn topic_label_defaults_to_general() {
        let q = Question {
            id: None,
            stem: "stem".into(),
            kind: sba(&["a", "b"], 1),
            topic: String::new(),
            topic_id: None,
            category: None,
            explanation: String::new(),
            further_reading: Vec::new(),
            images: None,
        };
        assert_eq!(q.topic_label(), "General");
    }

    #[test]
    fn reading_link_validates_url() {
        let good = ReadingLink {
            text: "NICE".into(),
            url: "https://example.org/guideline".into(),
        };
        let bad = ReadingLink {
            text: "broken".into(),
            url: "not a url".into(),
        };
        assert!(good.has_valid_url());
        assert!(!bad.has_valid_url());
    }
}
