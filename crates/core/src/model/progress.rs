use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::ids::{QuestionRef, QuizNumber};

//
// ─── BOOKMARKS ─────────────────────────────────────────────────────────────────
//

/// Bookmarked question indices per quiz for one license type.
///
/// The map stays sparse: a quiz number is present only while at least one of
/// its questions is bookmarked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bookmarks {
    by_quiz: BTreeMap<QuizNumber, BTreeSet<usize>>,
}

impl Bookmarks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bookmark. Returns `false` if it was already present.
    pub fn insert(&mut self, key: QuestionRef) -> bool {
        self.by_quiz.entry(key.quiz).or_default().insert(key.index)
    }

    /// Removes a bookmark, dropping the quiz entry once its set is empty.
    /// Returns `false` if nothing was removed.
    pub fn remove(&mut self, key: QuestionRef) -> bool {
        let Some(indices) = self.by_quiz.get_mut(&key.quiz) else {
            return false;
        };
        let removed = indices.remove(&key.index);
        if indices.is_empty() {
            self.by_quiz.remove(&key.quiz);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, key: QuestionRef) -> bool {
        self.by_quiz
            .get(&key.quiz)
            .is_some_and(|indices| indices.contains(&key.index))
    }

    #[must_use]
    pub fn for_quiz(&self, quiz: QuizNumber) -> Option<&BTreeSet<usize>> {
        self.by_quiz.get(&quiz)
    }

    pub fn quizzes(&self) -> impl Iterator<Item = (QuizNumber, &BTreeSet<usize>)> {
        self.by_quiz.iter().map(|(quiz, set)| (*quiz, set))
    }

    /// All bookmarked questions, ordered by quiz number then index.
    pub fn iter(&self) -> impl Iterator<Item = QuestionRef> + '_ {
        self.by_quiz.iter().flat_map(|(quiz, indices)| {
            indices
                .iter()
                .map(move |index| QuestionRef::new(*quiz, *index))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_quiz.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_quiz.is_empty()
    }
}

impl FromIterator<QuestionRef> for Bookmarks {
    fn from_iter<I: IntoIterator<Item = QuestionRef>>(iter: I) -> Self {
        let mut bookmarks = Bookmarks::new();
        for key in iter {
            bookmarks.insert(key);
        }
        bookmarks
    }
}

//
// ─── WRONG COUNTS ──────────────────────────────────────────────────────────────
//

/// How often each question was answered incorrectly. Absence means zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrongCounts {
    counts: BTreeMap<QuestionRef, u32>,
}

impl WrongCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the counter for `key`, starting at 1, and returns the new count.
    pub fn increment(&mut self, key: QuestionRef) -> u32 {
        let count = self.counts.entry(key).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Deletes the entry entirely and returns the previous count.
    pub fn remove(&mut self, key: QuestionRef) -> Option<u32> {
        self.counts.remove(&key)
    }

    /// Inserts a raw persisted count. Zero counts are not stored.
    pub fn set(&mut self, key: QuestionRef, count: u32) {
        if count == 0 {
            self.counts.remove(&key);
        } else {
            self.counts.insert(key, count);
        }
    }

    #[must_use]
    pub fn get(&self, key: QuestionRef) -> Option<u32> {
        self.counts.get(&key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionRef, u32)> + '_ {
        self.counts.iter().map(|(key, count)| (*key, *count))
    }

    /// Entries ordered by count descending; ties keep key order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(QuestionRef, u32)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

//
// ─── LAST SCORES ───────────────────────────────────────────────────────────────
//

/// Outcome of the most recent finished attempt of one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRecord {
    pub score: u32,
    pub total: u32,
    pub recorded_at: DateTime<Utc>,
}

impl ScoreRecord {
    #[must_use]
    pub fn new(score: u32, total: u32, recorded_at: DateTime<Utc>) -> Self {
        Self {
            score,
            total,
            recorded_at,
        }
    }

    /// True when every question of the attempt was answered correctly.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.score == self.total
    }
}

/// One score record per quiz number; recording overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastScores {
    by_quiz: BTreeMap<QuizNumber, ScoreRecord>,
}

impl LastScores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` for `quiz`, returning the record it replaced.
    pub fn record(&mut self, quiz: QuizNumber, record: ScoreRecord) -> Option<ScoreRecord> {
        self.by_quiz.insert(quiz, record)
    }

    #[must_use]
    pub fn get(&self, quiz: QuizNumber) -> Option<&ScoreRecord> {
        self.by_quiz.get(&quiz)
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuizNumber, &ScoreRecord)> {
        self.by_quiz.iter().map(|(quiz, record)| (*quiz, record))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_quiz.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_quiz.is_empty()
    }
}
