//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use theory_core::model::{InvalidQuizError, QuestionRef};

/// Errors emitted by quiz sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    InvalidQuiz(#[from] InvalidQuizError),
    #[error("session has not started")]
    NotStarted,
    #[error("session already finished")]
    Completed,
    #[error("time is up; continue or finish the session")]
    TimeExpired,
    #[error("question {index} is already revealed")]
    Revealed { index: usize },
    #[error("question index {index} is out of range (total {total})")]
    IndexOutOfRange { index: usize, total: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the saved/wrong review lists.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewError {
    #[error("question {0} is not in this list")]
    NotListed(QuestionRef),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
