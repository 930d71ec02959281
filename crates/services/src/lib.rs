#![forbid(unsafe_code)]

pub mod error;
pub mod ledger;
pub mod review;
pub mod sessions;

pub use theory_core::Clock;

pub use error::{ReviewError, SessionError};
pub use ledger::ProgressLedger;
pub use review::{BookmarkToggled, QuestionCard, SavedList, WrongList};

pub use sessions::{
    LiveQuiz, QuizLoopService, QuizSession, SessionPhase, SessionProgress, Step,
};
