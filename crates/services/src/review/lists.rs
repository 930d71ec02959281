//! Saved-question and wrong-answer review pages.
//!
//! Both lists load one ledger snapshot, flatten it in a fixed order and reveal
//! it page by page. Items are dropped locally once the matching ledger
//! mutation has succeeded.

use theory_core::model::{LicenseType, QuestionCatalog, QuestionRef};

use storage::repository::StorageError;

use super::card::{BookmarkToggled, QuestionCard};
use super::scroll::{ReviewWindow, SAVED_PAGE_SIZE, WRONG_PAGE_SIZE};
use crate::error::ReviewError;
use crate::ledger::ProgressLedger;

fn card_for(
    catalog: &dyn QuestionCatalog,
    license: LicenseType,
    key: QuestionRef,
) -> Option<QuestionCard> {
    let Some(question) = catalog.question(license, key) else {
        tracing::warn!(%license, question = %key, "skipping review entry missing from catalog");
        return None;
    };
    Some(QuestionCard::new(license, key, question))
}

//
// ─── SAVED ─────────────────────────────────────────────────────────────────────
//

/// Bookmarked questions ordered by quiz number, then index.
#[derive(Debug, Clone)]
pub struct SavedList {
    license: LicenseType,
    items: Vec<QuestionCard>,
    window: ReviewWindow,
}

impl SavedList {
    /// # Errors
    ///
    /// Returns `StorageError` if the bookmarks cannot be read.
    pub async fn load(
        ledger: &ProgressLedger,
        catalog: &dyn QuestionCatalog,
        license: LicenseType,
    ) -> Result<Self, StorageError> {
        let bookmarks = ledger.list_bookmarks(license).await?;
        let items: Vec<_> = bookmarks
            .iter()
            .filter_map(|key| card_for(catalog, license, key))
            .map(|card| card.with_bookmarked(true))
            .collect();
        let window = ReviewWindow::new(items.len(), SAVED_PAGE_SIZE);
        Ok(Self {
            license,
            items,
            window,
        })
    }

    #[must_use]
    pub fn license(&self) -> LicenseType {
        self.license
    }

    #[must_use]
    pub fn items(&self) -> &[QuestionCard] {
        &self.items
    }

    #[must_use]
    pub fn visible(&self) -> &[QuestionCard] {
        &self.items[..self.window.visible()]
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.window.has_more(self.items.len())
    }

    /// Reveal the next page. Returns how many items became visible.
    pub fn load_more(&mut self) -> usize {
        self.window.grow(self.items.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_mut(&mut self, key: QuestionRef) -> Option<&mut QuestionCard> {
        self.items.iter_mut().find(|card| card.key() == key)
    }

    /// Toggle a listed bookmark; an un-bookmarked item leaves the list.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotListed` for unknown items and
    /// `ReviewError::Storage` if the ledger write fails (the list is unchanged).
    pub async fn toggle_bookmark(
        &mut self,
        ledger: &ProgressLedger,
        key: QuestionRef,
    ) -> Result<BookmarkToggled, ReviewError> {
        let position = self
            .items
            .iter()
            .position(|card| card.key() == key)
            .ok_or(ReviewError::NotListed(key))?;

        let event = self.items[position].toggle_bookmark(ledger).await?;
        if !event.now_bookmarked {
            self.items.remove(position);
            self.window.clamp(self.items.len());
        }
        Ok(event)
    }
}

//
// ─── WRONG ANSWERS ─────────────────────────────────────────────────────────────
//

/// A frequently missed question and how often it was missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongItem {
    pub card: QuestionCard,
    pub count: u32,
}

/// Missed questions ordered by count descending, ties by quiz then index.
#[derive(Debug, Clone)]
pub struct WrongList {
    license: LicenseType,
    items: Vec<WrongItem>,
    window: ReviewWindow,
}

impl WrongList {
    /// # Errors
    ///
    /// Returns `StorageError` if the wrong counts or bookmarks cannot be read.
    pub async fn load(
        ledger: &ProgressLedger,
        catalog: &dyn QuestionCatalog,
        license: LicenseType,
    ) -> Result<Self, StorageError> {
        let counts = ledger.list_wrong_counts(license).await?;
        let bookmarks = ledger.list_bookmarks(license).await?;

        let items: Vec<_> = counts
            .ranked()
            .into_iter()
            .filter_map(|(key, count)| {
                let card = card_for(catalog, license, key)?.with_bookmarked(bookmarks.contains(key));
                Some(WrongItem { card, count })
            })
            .collect();
        let window = ReviewWindow::new(items.len(), WRONG_PAGE_SIZE);
        Ok(Self {
            license,
            items,
            window,
        })
    }

    #[must_use]
    pub fn license(&self) -> LicenseType {
        self.license
    }

    #[must_use]
    pub fn items(&self) -> &[WrongItem] {
        &self.items
    }

    #[must_use]
    pub fn visible(&self) -> &[WrongItem] {
        &self.items[..self.window.visible()]
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.window.has_more(self.items.len())
    }

    pub fn load_more(&mut self) -> usize {
        self.window.grow(self.items.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_mut(&mut self, key: QuestionRef) -> Option<&mut WrongItem> {
        self.items.iter_mut().find(|item| item.card.key() == key)
    }

    /// Toggle the bookmark of a listed question. The item stays listed.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotListed` or `ReviewError::Storage`.
    pub async fn toggle_bookmark(
        &mut self,
        ledger: &ProgressLedger,
        key: QuestionRef,
    ) -> Result<BookmarkToggled, ReviewError> {
        let item = self.item_mut(key).ok_or(ReviewError::NotListed(key))?;
        Ok(item.card.toggle_bookmark(ledger).await?)
    }

    /// Remove a question from the wrong-answer ledger and from this list.
    /// Returns the count it had.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotListed` for unknown items and
    /// `ReviewError::Storage` if the ledger write fails (the list is unchanged).
    pub async fn dismiss(
        &mut self,
        ledger: &ProgressLedger,
        key: QuestionRef,
    ) -> Result<u32, ReviewError> {
        let position = self
            .items
            .iter()
            .position(|item| item.card.key() == key)
            .ok_or(ReviewError::NotListed(key))?;

        let stored = ledger.remove_wrong(self.license, key).await?;
        let item = self.items.remove(position);
        self.window.clamp(self.items.len());
        tracing::debug!(question = %key, "wrong answer dismissed");
        Ok(stored.unwrap_or(item.count))
    }
}
