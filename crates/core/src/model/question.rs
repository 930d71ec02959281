use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::ParseIdError;

/// One of the four answer options of a question.
///
/// The catalog and the learner's selections use the numeric keys `"1"`..`"4"`,
/// which map onto the option fields `a`..`d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionKey {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [
        OptionKey::One,
        OptionKey::Two,
        OptionKey::Three,
        OptionKey::Four,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::One => "1",
            OptionKey::Two => "2",
            OptionKey::Three => "3",
            OptionKey::Four => "4",
        }
    }

    /// Letter of the option field this key points at.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            OptionKey::One => 'a',
            OptionKey::Two => 'b',
            OptionKey::Three => 'c',
            OptionKey::Four => 'd',
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = ParseIdError;

    /// Accepts either the numeric key or the option letter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "a" | "A" => Ok(OptionKey::One),
            "2" | "b" | "B" => Ok(OptionKey::Two),
            "3" | "c" | "C" => Ok(OptionKey::Three),
            "4" | "d" | "D" => Ok(OptionKey::Four),
            _ => Err(ParseIdError::new("OptionKey", s)),
        }
    }
}

/// A multiple-choice question as stored in the catalog. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
    pub answer: OptionKey,
}

impl Question {
    #[must_use]
    pub fn option_text(&self, key: OptionKey) -> &str {
        match key {
            OptionKey::One => &self.a,
            OptionKey::Two => &self.b,
            OptionKey::Three => &self.c,
            OptionKey::Four => &self.d,
        }
    }

    /// Options in display order, skipping blank ones (some questions only have
    /// two or three choices).
    pub fn options(&self) -> impl Iterator<Item = (OptionKey, &str)> {
        OptionKey::ALL
            .into_iter()
            .map(|key| (key, self.option_text(key)))
            .filter(|(_, text)| !text.trim().is_empty())
    }

    #[must_use]
    pub fn is_correct(&self, selected: OptionKey) -> bool {
        selected == self.answer
    }
}
