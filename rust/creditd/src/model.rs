use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

pub const SEMESTER_COUNT: u8 = 8;

/// One of the eight sequential academic terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Semester(u8);

impl Semester {
    pub fn new(n: i64) -> Result<Self, CoreError> {
        if (1..=SEMESTER_COUNT as i64).contains(&n) {
            Ok(Self(n as u8))
        } else {
            Err(CoreError::InvalidSemester(n))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Semester> {
        (1..=SEMESTER_COUNT).map(Semester)
    }

    /// Semesters `1..=last`. Callers only pass values within range.
    pub(crate) fn up_to(last: u8) -> Vec<Semester> {
        (1..=last.min(SEMESTER_COUNT)).map(Semester).collect()
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Semester {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let n = i64::deserialize(deserializer)?;
        Semester::new(n).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearOfStudy {
    First,
    Second,
    Third,
    Fourth,
}

impl YearOfStudy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "First" => Some(Self::First),
            "Second" => Some(Self::Second),
            "Third" => Some(Self::Third),
            "Fourth" => Some(Self::Fourth),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "First",
            Self::Second => "Second",
            Self::Third => "Third",
            Self::Fourth => "Fourth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub roll_no: String,
    pub name: String,
    pub department: String,
    /// Stored verbatim; an unrecognised value grants no semesters.
    pub year_of_study: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub teacher_id: String,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub semester: Semester,
    pub code: String,
    pub name: String,
    pub mode_of_study: String,
    pub credits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub id: String,
    pub roll_no: String,
    pub subject_id: i64,
    pub semester: Semester,
    pub completed: bool,
    pub saved: bool,
}
