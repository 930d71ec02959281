use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one fixed-order question subset within a license type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuizNumber(u32);

impl QuizNumber {
    #[must_use]
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Composite key for one question: quiz number plus position inside the quiz.
///
/// Ordering is by quiz number first, then by index. The persisted text form is
/// `"{quiz}-{index}"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestionRef {
    pub quiz: QuizNumber,
    pub index: usize,
}

impl QuestionRef {
    #[must_use]
    pub fn new(quiz: QuizNumber, index: usize) -> Self {
        Self { quiz, index }
    }
}

//
// ─── LICENSE TYPE ──────────────────────────────────────────────────────────────
//

/// License category partitioning the question catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Private,
    Light,
    Heavy,
    Taxi,
    Motorcycle,
    Tractor,
}

impl LicenseType {
    pub const ALL: [LicenseType; 6] = [
        LicenseType::Private,
        LicenseType::Light,
        LicenseType::Heavy,
        LicenseType::Taxi,
        LicenseType::Motorcycle,
        LicenseType::Tractor,
    ];

    /// Stable identifier used in catalog keys and ledger record keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LicenseType::Private => "private",
            LicenseType::Light => "light",
            LicenseType::Heavy => "heavy",
            LicenseType::Taxi => "taxi",
            LicenseType::Motorcycle => "motorcycle",
            LicenseType::Tractor => "tractor",
        }
    }

    /// Localized label shown in page titles.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            LicenseType::Private => "خصوصي",
            LicenseType::Light => "شحن خفيف",
            LicenseType::Heavy => "شحن ثقيل",
            LicenseType::Taxi => "عمومي",
            LicenseType::Motorcycle => "دراجة نارية",
            LicenseType::Tractor => "تراكتور",
        }
    }
}

impl fmt::Debug for QuizNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuizNumber({})", self.0)
    }
}

impl fmt::Debug for QuestionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionRef({}-{})", self.quiz.0, self.index)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for QuizNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.quiz, self.index)
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing identifiers from their text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

impl ParseIdError {
    pub(crate) fn new(kind: &'static str, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_owned(),
        }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for QuizNumber {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(QuizNumber::new)
            .map_err(|_| ParseIdError::new("QuizNumber", s))
    }
}

impl FromStr for QuestionRef {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (quiz, index) = s
            .rsplit_once('-')
            .ok_or_else(|| ParseIdError::new("QuestionRef", s))?;
        let quiz = quiz
            .parse::<QuizNumber>()
            .map_err(|_| ParseIdError::new("QuestionRef", s))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| ParseIdError::new("QuestionRef", s))?;
        Ok(QuestionRef::new(quiz, index))
    }
}

impl FromStr for LicenseType {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(LicenseType::Private),
            "light" => Ok(LicenseType::Light),
            "heavy" => Ok(LicenseType::Heavy),
            "taxi" => Ok(LicenseType::Taxi),
            "motorcycle" => Ok(LicenseType::Motorcycle),
            "tractor" => Ok(LicenseType::Tractor),
            _ => Err(ParseIdError::new("LicenseType", s)),
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
