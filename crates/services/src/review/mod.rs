mod card;
mod lists;
mod scroll;

pub use crate::error::ReviewError;
pub use card::{BookmarkToggled, QuestionCard};
pub use lists::{SavedList, WrongItem, WrongList};
pub use scroll::{
    LOAD_TRIGGER_OFFSET, ReviewWindow, SAVED_PAGE_SIZE, SCROLL_DEBOUNCE, ScrollMetrics,
    ScrollTrigger, WRONG_PAGE_SIZE,
};
