use theory_core::model::{LicenseType, OptionKey, Question, QuestionRef, QuizNumber};

use storage::repository::StorageError;

use crate::ledger::ProgressLedger;

/// Emitted after a bookmark toggle has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookmarkToggled {
    pub quiz: QuizNumber,
    pub index: usize,
    pub now_bookmarked: bool,
}

impl BookmarkToggled {
    #[must_use]
    pub fn question(&self) -> QuestionRef {
        QuestionRef::new(self.quiz, self.index)
    }
}

/// One question rendered on a review page, with its own selection state.
///
/// Cards are independent of any quiz session: selecting or revealing here
/// never touches the wrong-answer tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCard {
    license: LicenseType,
    key: QuestionRef,
    question: Question,
    selected: Option<OptionKey>,
    revealed: bool,
    bookmarked: bool,
}

impl QuestionCard {
    #[must_use]
    pub fn new(license: LicenseType, key: QuestionRef, question: Question) -> Self {
        Self {
            license,
            key,
            question,
            selected: None,
            revealed: false,
            bookmarked: false,
        }
    }

    #[must_use]
    pub fn with_bookmarked(mut self, bookmarked: bool) -> Self {
        self.bookmarked = bookmarked;
        self
    }

    #[must_use]
    pub fn key(&self) -> QuestionRef {
        self.key
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn selected(&self) -> Option<OptionKey> {
        self.selected
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    #[must_use]
    pub fn is_bookmarked(&self) -> bool {
        self.bookmarked
    }

    /// Pick an option. Ignored once the card is revealed; returns whether the
    /// selection was applied.
    pub fn select(&mut self, option: OptionKey) -> bool {
        if self.revealed {
            return false;
        }
        self.selected = Some(option);
        true
    }

    pub fn reveal(&mut self) {
        self.revealed = true;
    }

    /// `None` until an option is selected.
    #[must_use]
    pub fn is_correct(&self) -> Option<bool> {
        self.selected.map(|selected| self.question.is_correct(selected))
    }

    /// Refresh the bookmarked flag from the ledger.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the ledger cannot be read; the flag is left as is.
    pub async fn load_bookmark_state(&mut self, ledger: &ProgressLedger) -> Result<bool, StorageError> {
        self.bookmarked = ledger.is_bookmarked(self.license, self.key).await?;
        Ok(self.bookmarked)
    }

    /// Flip the bookmark in the ledger, then in the card.
    ///
    /// The card changes only after the write succeeds; on failure it keeps its
    /// previous state and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the ledger write fails.
    pub async fn toggle_bookmark(
        &mut self,
        ledger: &ProgressLedger,
    ) -> Result<BookmarkToggled, StorageError> {
        let now_bookmarked = if self.bookmarked {
            ledger.remove_bookmark(self.license, self.key).await?;
            false
        } else {
            ledger.add_bookmark(self.license, self.key).await?;
            true
        };
        self.bookmarked = now_bookmarked;
        tracing::debug!(question = %self.key, now_bookmarked, "bookmark toggled");
        Ok(BookmarkToggled {
            quiz: self.key.quiz,
            index: self.key.index,
            now_bookmarked,
        })
    }
}
