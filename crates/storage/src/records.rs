//! JSON codecs for the three persisted progress records.
//!
//! Shapes are fixed for compatibility with data written by earlier builds:
//!
//! - `bookmarks:{type}`    → `{"1": [0, 2, 5], "2": [1]}`
//! - `wrongAnswers:{type}` → `{"1-0": 3, "2-5": 1}`
//! - `lastScores:{type}`   → `{"1": {"grade": 7, "total": 30, "time": "2024-01-01T10:00:00.000Z"}}`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use theory_core::model::{
    Bookmarks, LastScores, LicenseType, QuestionRef, QuizNumber, ScoreRecord, WrongCounts,
};
use theory_core::time::{iso_timestamp, parse_iso_timestamp};

/// A stored record that could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("malformed record {key}: {reason}")]
    Malformed { key: String, reason: String },
}

/// The persisted record namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Bookmarks,
    WrongAnswers,
    LastScores,
}

impl RecordKind {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            RecordKind::Bookmarks => "bookmarks",
            RecordKind::WrongAnswers => "wrongAnswers",
            RecordKind::LastScores => "lastScores",
        }
    }

    /// Storage key of this record for one license type.
    #[must_use]
    pub fn key(self, license: LicenseType) -> String {
        format!("{}:{}", self.prefix(), license.as_str())
    }
}

fn malformed(key: &str, err: impl std::fmt::Display) -> RecordError {
    RecordError::Malformed {
        key: key.to_owned(),
        reason: err.to_string(),
    }
}

//
// ─── BOOKMARKS ─────────────────────────────────────────────────────────────────
//

/// Decode a bookmarks document. Quiz keys that are not numbers are skipped.
///
/// # Errors
///
/// Returns `RecordError::Malformed` if `raw` is not a JSON object of index lists.
pub fn decode_bookmarks(key: &str, raw: &str) -> Result<Bookmarks, RecordError> {
    let parsed: BTreeMap<String, Vec<usize>> =
        serde_json::from_str(raw).map_err(|e| malformed(key, e))?;

    let mut bookmarks = Bookmarks::new();
    for (quiz, indices) in parsed {
        let Ok(quiz) = quiz.parse::<QuizNumber>() else {
            tracing::warn!(record = key, quiz = %quiz, "skipping bookmark entry with invalid quiz number");
            continue;
        };
        for index in indices {
            bookmarks.insert(QuestionRef::new(quiz, index));
        }
    }
    Ok(bookmarks)
}

/// Encode bookmarks. Quizzes without bookmarks never appear in the output.
///
/// # Errors
///
/// Returns `RecordError::Malformed` if serialization fails.
pub fn encode_bookmarks(key: &str, bookmarks: &Bookmarks) -> Result<String, RecordError> {
    let shaped: BTreeMap<String, Vec<usize>> = bookmarks
        .quizzes()
        .map(|(quiz, indices)| (quiz.to_string(), indices.iter().copied().collect()))
        .collect();
    serde_json::to_string(&shaped).map_err(|e| malformed(key, e))
}

//
// ─── WRONG ANSWERS ─────────────────────────────────────────────────────────────
//

/// Decode a wrong-answer tally. Keys that are not `"{quiz}-{index}"` are skipped.
///
/// # Errors
///
/// Returns `RecordError::Malformed` if `raw` is not a JSON object of counts.
pub fn decode_wrong_counts(key: &str, raw: &str) -> Result<WrongCounts, RecordError> {
    let parsed: BTreeMap<String, u32> = serde_json::from_str(raw).map_err(|e| malformed(key, e))?;

    let mut counts = WrongCounts::new();
    for (question, count) in parsed {
        match question.parse::<QuestionRef>() {
            Ok(question) => counts.set(question, count),
            Err(err) => {
                tracing::warn!(record = key, error = %err, "skipping wrong-answer entry");
            }
        }
    }
    Ok(counts)
}

/// # Errors
///
/// Returns `RecordError::Malformed` if serialization fails.
pub fn encode_wrong_counts(key: &str, counts: &WrongCounts) -> Result<String, RecordError> {
    let shaped: BTreeMap<String, u32> = counts
        .iter()
        .map(|(question, count)| (question.to_string(), count))
        .collect();
    serde_json::to_string(&shaped).map_err(|e| malformed(key, e))
}

//
// ─── LAST SCORES ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize, Deserialize)]
struct StoredScore {
    grade: u32,
    total: u32,
    time: String,
}

/// Decode the last-score map. Entries with an invalid quiz key or timestamp
/// are skipped.
///
/// # Errors
///
/// Returns `RecordError::Malformed` if `raw` is not a JSON object of score entries.
pub fn decode_last_scores(key: &str, raw: &str) -> Result<LastScores, RecordError> {
    let parsed: BTreeMap<String, StoredScore> =
        serde_json::from_str(raw).map_err(|e| malformed(key, e))?;

    let mut scores = LastScores::new();
    for (quiz, stored) in parsed {
        let Ok(quiz) = quiz.parse::<QuizNumber>() else {
            tracing::warn!(record = key, quiz = %quiz, "skipping score entry with invalid quiz number");
            continue;
        };
        let Some(recorded_at) = parse_iso_timestamp(&stored.time) else {
            tracing::warn!(record = key, %quiz, time = %stored.time, "skipping score entry with invalid time");
            continue;
        };
        scores.record(quiz, ScoreRecord::new(stored.grade, stored.total, recorded_at));
    }
    Ok(scores)
}

/// # Errors
///
/// Returns `RecordError::Malformed` if serialization fails.
pub fn encode_last_scores(key: &str, scores: &LastScores) -> Result<String, RecordError> {
    let shaped: BTreeMap<String, StoredScore> = scores
        .iter()
        .map(|(quiz, record)| {
            (
                quiz.to_string(),
                StoredScore {
                    grade: record.score,
                    total: record.total,
                    time: iso_timestamp(record.recorded_at),
                },
            )
        })
        .collect();
    serde_json::to_string(&shaped).map_err(|e| malformed(key, e))
}
