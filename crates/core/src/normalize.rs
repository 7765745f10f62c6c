//! Normalization boundary between raw catalog rows and the canonical
//! [`Question`] model.
//!
//! Catalog rows arrive loosely typed: collection fields may be JSON encoded
//! as strings, plain literals, or already structured; the correct answer may
//! be an index, a letter, an encoded array, or the option text itself. All
//! of that is resolved here, once; downstream code never re-interprets raw
//! shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{EmqStem, Question, QuestionId, QuestionKind, QuestionType, ReadingLink};

/// Placeholder substituted for an SBA record with no stem.
pub const MISSING_STEM_PLACEHOLDER: &str = "(No clinical stem provided)";

/// Theme substituted for an EMQ record with no theme.
pub const DEFAULT_EMQ_THEME: &str = "Clinical Case";

//
// ─── RAW RECORD ────────────────────────────────────────────────────────────────
//

/// One raw catalog row, exactly as fetched from the question repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub id: Value,
    #[serde(rename = "type")]
    pub question_type: Value,
    pub stem: Value,
    pub theme: Value,
    pub options: Value,
    pub stems: Value,
    pub correct_answer: Value,
    pub tolerance: Value,
    pub unit: Value,
    pub topic: Value,
    pub topic_id: Value,
    #[serde(alias = "Category")]
    pub category: Value,
    pub explanation: Value,
    #[serde(alias = "furtherReading")]
    pub further_reading: Value,
    pub images: Value,
}

//
// ─── SKIP REASONS & REPORT ─────────────────────────────────────────────────────
//

/// Why a raw record was excluded from the usable catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SkipReason {
    #[error("unknown or missing question type")]
    UnknownType,
    #[error("EMQ record has no stems")]
    EmqStemsMissing,
    #[error("EMQ record has no options")]
    EmqOptionsMissing,
    #[error("EMQ stem {stem} has an unresolvable correct index")]
    EmqStemCorrectUnresolved { stem: usize },
    #[error("SBA correct answer could not be resolved to an option index")]
    SbaCorrectUnresolved,
    #[error("MBA correct set is empty after normalization")]
    MbaCorrectSetEmpty,
    #[error("numeric correct answer is not coercible to a number")]
    NumericAnswerMissing,
    #[error("correct index {index} is outside the option list ({len} options)")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

/// A skipped record, by position in the fetched row list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: SkipReason,
}

/// Outcome of normalizing a full fetch, surfaced to the caller so skipped
/// records are never silently folded away.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCatalog {
    pub questions: Vec<Question>,
    pub skipped: Vec<SkippedRecord>,
}

impl NormalizedCatalog {
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

//
// ─── DEFENSIVE PARSING HELPERS ─────────────────────────────────────────────────
//

/// Structured-parses a value only when it plausibly holds an encoded
/// collection (trimmed text starting with `{` or `[`). Anything else, and
/// any parse failure, yields the original value unchanged.
fn safe_parse(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let trimmed = text.trim();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return value.clone();
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| value.clone())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_or_empty(value: &Value) -> String {
    as_text(value).unwrap_or_default()
}

fn optional_text(value: &Value) -> Option<String> {
    as_text(value).filter(|s| !s.trim().is_empty())
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A single letter A–E (either case) mapped to a zero-based index.
fn letter_index(text: &str) -> Option<usize> {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let upper = first.to_ascii_uppercase();
    ('A'..='E')
        .contains(&upper)
        .then(|| (upper as usize) - ('A' as usize))
}

fn string_list(value: &Value) -> Vec<String> {
    match safe_parse(value) {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        _ => Vec::new(),
    }
}

fn reading_links(value: &Value) -> Vec<ReadingLink> {
    let Value::Array(items) = safe_parse(value) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            Some(ReadingLink {
                text: text_or_empty(obj.get("text")?),
                url: obj.get("url").map(text_or_empty).unwrap_or_default(),
            })
        })
        .collect()
}

//
// ─── CORRECT-ANSWER RESOLUTION ─────────────────────────────────────────────────
//

/// Resolves a raw correct-answer value through the ordered fallback chain:
/// pure-digit string, single letter A–E, structured parse, then literal text
/// match against the option list. The first matching rule wins.
fn resolve_correct(raw: &Value, options: &[String]) -> Value {
    if let Value::String(text) = raw {
        let trimmed = text.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = trimmed.parse::<u64>() {
                return Value::from(index);
            }
        }
        if let Some(index) = letter_index(trimmed) {
            return Value::from(index as u64);
        }
        let parsed = safe_parse(raw);
        if !matches!(parsed, Value::String(_)) {
            return parsed;
        }
        let lowered = trimmed.to_lowercase();
        if let Some(index) = options
            .iter()
            .position(|opt| opt.trim().to_lowercase() == lowered)
        {
            return Value::from(index as u64);
        }
    }
    raw.clone()
}

/// Coerces a resolved correct value into an MBA index set. Accepts arrays,
/// comma-separated strings, bare integers, and single letters.
fn correct_index_set(resolved: &Value) -> Vec<usize> {
    match resolved {
        Value::Array(items) => items.iter().filter_map(as_index).collect(),
        Value::Number(_) => as_index(resolved).into_iter().collect(),
        Value::String(text) if text.contains(',') => text
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
        Value::String(text) => letter_index(text)
            .or_else(|| text.trim().parse().ok())
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

/// Unwraps a numeric correct answer possibly nested in an object under
/// `value`, `answer`, or `correct`.
fn numeric_answer(resolved: &Value) -> Option<f64> {
    if let Value::Object(obj) = resolved {
        return ["value", "answer", "correct"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(as_f64));
    }
    as_f64(resolved)
}

//
// ─── PER-RECORD NORMALIZATION ──────────────────────────────────────────────────
//

fn check_bounds(index: usize, len: usize) -> Result<usize, SkipReason> {
    if index < len {
        Ok(index)
    } else {
        Err(SkipReason::CorrectIndexOutOfRange { index, len })
    }
}

#[derive(Debug, Deserialize)]
struct RawStem {
    #[serde(alias = "text")]
    stem: Option<Value>,
    correct: Option<Value>,
    #[serde(default)]
    explanation: Value,
}

fn parse_stems(value: &Value, options: &[String]) -> Result<Vec<EmqStem>, SkipReason> {
    let Value::Array(items) = safe_parse(value) else {
        return Ok(Vec::new());
    };
    items
        .into_iter()
        .enumerate()
        .map(|(stem_idx, item)| {
            let raw: RawStem = serde_json::from_value(item)
                .map_err(|_| SkipReason::EmqStemCorrectUnresolved { stem: stem_idx })?;
            let correct_value = raw.correct.unwrap_or(Value::Null);
            let resolved = resolve_correct(&correct_value, options);
            let correct = as_index(&resolved)
                .ok_or(SkipReason::EmqStemCorrectUnresolved { stem: stem_idx })?;
            Ok(EmqStem {
                text: raw.stem.as_ref().map(text_or_empty).unwrap_or_default(),
                correct: check_bounds(correct, options.len())?,
                explanation: text_or_empty(&raw.explanation),
            })
        })
        .collect()
}

/// Normalizes one raw record into a canonical [`Question`], or explains why
/// it cannot be used.
///
/// # Errors
///
/// Returns a [`SkipReason`] when the record has no resolvable correctness
/// target for its type; malformed fields short of that are recovered
/// locally, never propagated.
pub fn normalize_record(raw: &RawRecord) -> Result<Question, SkipReason> {
    let qtype = as_text(&raw.question_type)
        .and_then(|tag| QuestionType::parse(&tag))
        .ok_or(SkipReason::UnknownType)?;

    // EMQ rows sometimes carry the whole payload inside the stem field;
    // lift theme/options/stems into their own fields before parsing them.
    let mut theme = raw.theme.clone();
    let mut options_value = raw.options.clone();
    let mut stems_value = raw.stems.clone();
    let mut stem_text = optional_text(&raw.stem);

    if qtype == QuestionType::Emq {
        let payload = safe_parse(&raw.stem);
        if let Value::Object(obj) = payload {
            if theme.is_null() {
                theme = obj.get("theme").cloned().unwrap_or(Value::Null);
            }
            if options_value.is_null() {
                options_value = obj.get("options").cloned().unwrap_or(Value::Null);
            }
            if stems_value.is_null() {
                stems_value = obj.get("stems").cloned().unwrap_or(Value::Null);
            }
            stem_text = None;
        }
    }

    let options = string_list(&options_value);
    let resolved_correct = resolve_correct(&raw.correct_answer, &options);

    let kind = match qtype {
        QuestionType::Sba => {
            let correct =
                as_index(&resolved_correct).ok_or(SkipReason::SbaCorrectUnresolved)?;
            QuestionKind::Sba {
                correct: check_bounds(correct, options.len())?,
                options,
            }
        }
        QuestionType::Emq => {
            if options.is_empty() {
                return Err(SkipReason::EmqOptionsMissing);
            }
            let stems = parse_stems(&stems_value, &options)?;
            if stems.is_empty() {
                return Err(SkipReason::EmqStemsMissing);
            }
            QuestionKind::Emq {
                theme: optional_text(&theme).unwrap_or_else(|| DEFAULT_EMQ_THEME.to_owned()),
                options,
                stems,
            }
        }
        QuestionType::Mba => {
            let indices = correct_index_set(&resolved_correct);
            if indices.is_empty() {
                return Err(SkipReason::MbaCorrectSetEmpty);
            }
            let len = options.len();
            let correct = indices
                .into_iter()
                .map(|index| check_bounds(index, len))
                .collect::<Result<_, _>>()?;
            QuestionKind::Mba { options, correct }
        }
        QuestionType::Numeric => QuestionKind::Numeric {
            correct_answer: numeric_answer(&resolved_correct)
                .or_else(|| numeric_answer(&raw.correct_answer))
                .ok_or(SkipReason::NumericAnswerMissing)?,
            tolerance: as_f64(&raw.tolerance).unwrap_or(0.0),
            unit: optional_text(&raw.unit),
        },
    };

    let stem = match stem_text {
        Some(text) => text,
        None if qtype == QuestionType::Sba => MISSING_STEM_PLACEHOLDER.to_owned(),
        None => String::new(),
    };

    Ok(Question {
        id: as_text(&raw.id).and_then(QuestionId::new),
        stem,
        kind,
        topic: text_or_empty(&raw.topic),
        topic_id: optional_text(&raw.topic_id),
        category: optional_text(&raw.category),
        explanation: text_or_empty(&raw.explanation),
        further_reading: reading_links(&raw.further_reading),
        images: optional_text(&raw.images),
    })
}

/// Normalizes a full fetch of raw rows, keeping per-record failures as an
/// explicit skip list.
#[must_use]
pub fn normalize_catalog(rows: &[RawRecord]) -> NormalizedCatalog {
    let mut questions = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match normalize_record(row) {
            Ok(question) => questions.push(question),
            Err(reason) => skipped.push(SkippedRecord { index, reason }),
        }
    }
    NormalizedCatalog { questions, skipped }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
