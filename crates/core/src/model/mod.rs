mod catalog;
mod ids;
mod progress;
mod question;

pub use catalog::{InMemoryCatalog, InvalidQuizError, QuestionCatalog};
pub use ids::{LicenseType, ParseIdError, QuestionRef, QuizNumber};
pub use progress::{Bookmarks, LastScores, ScoreRecord, WrongCounts};
pub use question::{OptionKey, Question};
