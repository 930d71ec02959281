use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::model::ids::{LicenseType, QuestionRef, QuizNumber};
use crate::model::question::Question;

/// Errors raised when a quiz cannot be started from the catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidQuizError {
    #[error("license type {0} has no quizzes in the catalog")]
    UnknownLicense(LicenseType),

    #[error("quiz {quiz} not found for license type {license}")]
    UnknownQuiz {
        license: LicenseType,
        quiz: QuizNumber,
    },

    #[error("quiz {quiz} for license type {license} has no questions")]
    Empty {
        license: LicenseType,
        quiz: QuizNumber,
    },
}

/// Read-only question bank keyed by license type, then quiz number.
///
/// Loaded once at start-up and shared by sessions and review lists.
pub trait QuestionCatalog: Send + Sync {
    /// Ordered questions of one quiz.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuizError` if the type or quiz is unknown, or the quiz is empty.
    fn quiz(&self, license: LicenseType, quiz: QuizNumber)
    -> Result<Arc<[Question]>, InvalidQuizError>;

    /// Quiz numbers available for a license type, ascending.
    fn quiz_numbers(&self, license: LicenseType) -> Vec<QuizNumber>;

    fn question(&self, license: LicenseType, key: QuestionRef) -> Option<Question> {
        self.quiz(license, key.quiz)
            .ok()
            .and_then(|questions| questions.get(key.index).cloned())
    }
}

/// Catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    quizzes: HashMap<LicenseType, BTreeMap<QuizNumber, Arc<[Question]>>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one quiz.
    pub fn insert_quiz(&mut self, license: LicenseType, quiz: QuizNumber, questions: Vec<Question>) {
        self.quizzes
            .entry(license)
            .or_default()
            .insert(quiz, Arc::from(questions));
    }

    #[must_use]
    pub fn with_quiz(mut self, license: LicenseType, quiz: QuizNumber, questions: Vec<Question>) -> Self {
        self.insert_quiz(license, quiz, questions);
        self
    }

    #[must_use]
    pub fn license_types(&self) -> Vec<LicenseType> {
        let mut types: Vec<_> = self.quizzes.keys().copied().collect();
        types.sort();
        types
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.quizzes
            .values()
            .flat_map(BTreeMap::values)
            .map(|questions| questions.len())
            .sum()
    }
}

impl QuestionCatalog for InMemoryCatalog {
    fn quiz(
        &self,
        license: LicenseType,
        quiz: QuizNumber,
    ) -> Result<Arc<[Question]>, InvalidQuizError> {
        let by_quiz = self
            .quizzes
            .get(&license)
            .ok_or(InvalidQuizError::UnknownLicense(license))?;
        let questions = by_quiz
            .get(&quiz)
            .ok_or(InvalidQuizError::UnknownQuiz { license, quiz })?;
        if questions.is_empty() {
            return Err(InvalidQuizError::Empty { license, quiz });
        }
        Ok(Arc::clone(questions))
    }

    fn quiz_numbers(&self, license: LicenseType) -> Vec<QuizNumber> {
        self.quizzes
            .get(&license)
            .map(|by_quiz| by_quiz.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptionKey;

    fn question(text: &str) -> Question {
        Question {
            question: text.into(),
            a: "a".into(),
            b: "b".into(),
            c: "c".into(),
            d: "d".into(),
            answer: OptionKey::One,
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_quiz(LicenseType::Private, QuizNumber::new(2), vec![question("q0"), question("q1")])
            .with_quiz(LicenseType::Private, QuizNumber::new(1), vec![question("p0")])
            .with_quiz(LicenseType::Taxi, QuizNumber::new(1), Vec::new())
    }

    #[test]
    fn quiz_lookup_reports_each_failure() {
        let catalog = catalog();
        assert_eq!(
            catalog.quiz(LicenseType::Heavy, QuizNumber::new(1)).unwrap_err(),
            InvalidQuizError::UnknownLicense(LicenseType::Heavy)
        );
        assert!(matches!(
            catalog.quiz(LicenseType::Private, QuizNumber::new(9)),
            Err(InvalidQuizError::UnknownQuiz { .. })
        ));
        assert!(matches!(
            catalog.quiz(LicenseType::Taxi, QuizNumber::new(1)),
            Err(InvalidQuizError::Empty { .. })
        ));
    }

    #[test]
    fn question_lookup_by_ref() {
        let catalog = catalog();
        let key = QuestionRef::new(QuizNumber::new(2), 1);
        assert_eq!(catalog.question(LicenseType::Private, key).unwrap().question, "q1");
        let missing = QuestionRef::new(QuizNumber::new(2), 5);
        assert!(catalog.question(LicenseType::Private, missing).is_none());
    }

    #[test]
    fn quiz_numbers_are_sorted() {
        let numbers = catalog().quiz_numbers(LicenseType::Private);
        assert_eq!(numbers, [QuizNumber::new(1), QuizNumber::new(2)]);
        assert_eq!(catalog().question_count(), 3);
    }
}
