//! Loading the bundled question bank.
//!
//! The bundle has the shape `{"n": {"private": {"1": [Question, ...]}}}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use theory_core::model::{InMemoryCatalog, LicenseType, Question, QuizNumber};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct CatalogBundle {
    n: BTreeMap<String, BTreeMap<String, Vec<Question>>>,
}

/// Parse a catalog bundle. Unknown license types and non-numeric quiz keys are
/// skipped with a warning.
///
/// # Errors
///
/// Returns `CatalogError::Json` if the document does not match the bundle shape.
pub fn load_catalog_str(raw: &str) -> Result<InMemoryCatalog, CatalogError> {
    let bundle: CatalogBundle = serde_json::from_str(raw)?;
    let mut catalog = InMemoryCatalog::new();

    for (license, quizzes) in bundle.n {
        let Ok(license) = license.parse::<LicenseType>() else {
            tracing::warn!(license = %license, "skipping unknown license type in catalog");
            continue;
        };
        for (quiz, questions) in quizzes {
            let Ok(quiz) = quiz.parse::<QuizNumber>() else {
                tracing::warn!(%license, quiz = %quiz, "skipping quiz with invalid number");
                continue;
            };
            catalog.insert_quiz(license, quiz, questions);
        }
    }

    tracing::debug!(
        questions = catalog.question_count(),
        "question catalog loaded"
    );
    Ok(catalog)
}

/// Read and parse a catalog bundle from disk.
///
/// # Errors
///
/// Returns `CatalogError` if the file cannot be read or parsed.
pub fn load_catalog_file(path: impl AsRef<Path>) -> Result<InMemoryCatalog, CatalogError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_catalog_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use theory_core::model::{OptionKey, QuestionCatalog};

    const BUNDLE: &str = r#"{
        "n": {
            "private": {
                "1": [
                    {"question":"Q1","a":"A","b":"B","c":"C","d":"D","answer":"2"},
                    {"question":"Q2","a":"A","b":"B","c":"C","d":"D","answer":"1"}
                ],
                "two": []
            },
            "bus": { "1": [] }
        }
    }"#;

    #[test]
    fn loads_known_types_and_quizzes() {
        let catalog = load_catalog_str(BUNDLE).unwrap();
        let quiz = catalog.quiz(LicenseType::Private, QuizNumber::new(1)).unwrap();
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz[0].answer, OptionKey::Two);
        assert_eq!(catalog.license_types(), [LicenseType::Private]);
        assert_eq!(catalog.quiz_numbers(LicenseType::Private), [QuizNumber::new(1)]);
    }

    #[test]
    fn rejects_documents_without_bundle_root() {
        assert!(matches!(load_catalog_str(r#"{"private":{}}"#), Err(CatalogError::Json(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_catalog_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
