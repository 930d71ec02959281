#![forbid(unsafe_code)]

pub mod model;
pub mod time;

pub use model::{InvalidQuizError, QuestionCatalog};
pub use time::Clock;
