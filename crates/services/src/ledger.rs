use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use storage::records::{
    RecordError, RecordKind, decode_bookmarks, decode_last_scores, decode_wrong_counts,
    encode_bookmarks, encode_last_scores, encode_wrong_counts,
};
use storage::repository::{InMemoryStore, PreferenceStore, StorageError};
use theory_core::model::{
    Bookmarks, LastScores, LicenseType, QuestionRef, QuizNumber, ScoreRecord, WrongCounts,
};

use crate::Clock;

/// Per-record async locks so read-modify-write cycles on the same key run one
/// after another instead of merging stale reads.
#[derive(Default)]
struct RecordLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RecordLocks {
    async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>, StorageError> {
        let lock = {
            let mut guard = self
                .inner
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            Arc::clone(guard.entry(key.to_owned()).or_default())
        };
        Ok(lock.lock_owned().await)
    }
}

/// Persistent per-license store of bookmarks, wrong-answer tallies and last
/// scores.
///
/// Every read returns a freshly decoded snapshot. Mutations are
/// read-modify-write cycles serialized per record key. A stored record that
/// fails to decode is treated as absent.
#[derive(Clone)]
pub struct ProgressLedger {
    clock: Clock,
    store: Arc<dyn PreferenceStore>,
    locks: Arc<RecordLocks>,
}

impl ProgressLedger {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            clock,
            store,
            locks: Arc::new(RecordLocks::default()),
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(clock, Arc::new(InMemoryStore::new()))
    }

    //
    // ─── BOOKMARKS ─────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn list_bookmarks(&self, license: LicenseType) -> Result<Bookmarks, StorageError> {
        let key = RecordKind::Bookmarks.key(license);
        self.read(&key, decode_bookmarks).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn is_bookmarked(
        &self,
        license: LicenseType,
        question: QuestionRef,
    ) -> Result<bool, StorageError> {
        Ok(self.list_bookmarks(license).await?.contains(question))
    }

    /// Bookmark a question. Adding an existing bookmark changes nothing and
    /// returns `false`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or written.
    pub async fn add_bookmark(
        &self,
        license: LicenseType,
        question: QuestionRef,
    ) -> Result<bool, StorageError> {
        let key = RecordKind::Bookmarks.key(license);
        let _guard = self.locks.acquire(&key).await?;

        let mut bookmarks = self.read(&key, decode_bookmarks).await?;
        if !bookmarks.insert(question) {
            return Ok(false);
        }
        self.write(&key, encode_bookmarks(&key, &bookmarks)).await?;
        tracing::debug!(%license, %question, "bookmark added");
        Ok(true)
    }

    /// Remove a bookmark. Removing an absent bookmark changes nothing and
    /// returns `false`; emptied quiz entries are dropped from the record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or written.
    pub async fn remove_bookmark(
        &self,
        license: LicenseType,
        question: QuestionRef,
    ) -> Result<bool, StorageError> {
        let key = RecordKind::Bookmarks.key(license);
        let _guard = self.locks.acquire(&key).await?;

        let mut bookmarks = self.read(&key, decode_bookmarks).await?;
        if !bookmarks.remove(question) {
            return Ok(false);
        }
        self.write(&key, encode_bookmarks(&key, &bookmarks)).await?;
        tracing::debug!(%license, %question, "bookmark removed");
        Ok(true)
    }

    /// Flip the stored bookmark state and return the new state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or written.
    pub async fn toggle_bookmark(
        &self,
        license: LicenseType,
        question: QuestionRef,
    ) -> Result<bool, StorageError> {
        let key = RecordKind::Bookmarks.key(license);
        let _guard = self.locks.acquire(&key).await?;

        let mut bookmarks = self.read(&key, decode_bookmarks).await?;
        let now_bookmarked = if bookmarks.contains(question) {
            bookmarks.remove(question);
            false
        } else {
            bookmarks.insert(question);
            true
        };
        self.write(&key, encode_bookmarks(&key, &bookmarks)).await?;
        Ok(now_bookmarked)
    }

    //
    // ─── WRONG ANSWERS ─────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn list_wrong_counts(
        &self,
        license: LicenseType,
    ) -> Result<WrongCounts, StorageError> {
        let key = RecordKind::WrongAnswers.key(license);
        self.read(&key, decode_wrong_counts).await
    }

    /// Count one more wrong answer for `question` and return the new tally.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or written.
    pub async fn increment_wrong(
        &self,
        license: LicenseType,
        question: QuestionRef,
    ) -> Result<u32, StorageError> {
        let key = RecordKind::WrongAnswers.key(license);
        let _guard = self.locks.acquire(&key).await?;

        let mut counts = self.read(&key, decode_wrong_counts).await?;
        let count = counts.increment(question);
        self.write(&key, encode_wrong_counts(&key, &counts)).await?;
        tracing::debug!(%license, %question, count, "wrong answer recorded");
        Ok(count)
    }

    /// Dismiss `question` from the wrong-answer list entirely. Returns the
    /// count it had, or `None` if it was not listed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or written.
    pub async fn remove_wrong(
        &self,
        license: LicenseType,
        question: QuestionRef,
    ) -> Result<Option<u32>, StorageError> {
        let key = RecordKind::WrongAnswers.key(license);
        let _guard = self.locks.acquire(&key).await?;

        let mut counts = self.read(&key, decode_wrong_counts).await?;
        let Some(previous) = counts.remove(question) else {
            return Ok(None);
        };
        self.write(&key, encode_wrong_counts(&key, &counts)).await?;
        Ok(Some(previous))
    }

    //
    // ─── LAST SCORES ───────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn list_scores(&self, license: LicenseType) -> Result<LastScores, StorageError> {
        let key = RecordKind::LastScores.key(license);
        self.read(&key, decode_last_scores).await
    }

    /// Overwrite the last score of `quiz`. `recorded_at` defaults to the
    /// ledger clock.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or written.
    pub async fn record_score(
        &self,
        license: LicenseType,
        quiz: QuizNumber,
        score: u32,
        total: u32,
        recorded_at: Option<DateTime<Utc>>,
    ) -> Result<ScoreRecord, StorageError> {
        let key = RecordKind::LastScores.key(license);
        let _guard = self.locks.acquire(&key).await?;

        let record = ScoreRecord::new(score, total, recorded_at.unwrap_or_else(|| self.clock.now()));
        let mut scores = self.read(&key, decode_last_scores).await?;
        scores.record(quiz, record);
        self.write(&key, encode_last_scores(&key, &scores)).await?;
        Ok(record)
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    async fn read<T: Default>(
        &self,
        key: &str,
        decode: fn(&str, &str) -> Result<T, RecordError>,
    ) -> Result<T, StorageError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(T::default());
        };
        match decode(key, &raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable progress record");
                Ok(T::default())
            }
        }
    }

    async fn write(
        &self,
        key: &str,
        encoded: Result<String, RecordError>,
    ) -> Result<(), StorageError> {
        let value = encoded.map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(key, value).await
    }
}
