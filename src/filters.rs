use std::collections::HashSet;
use std::convert::Infallible;
use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::models::{Application, Dataset};

/// A dashboard dropdown value: either `"all"` or one concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => value == Some(expected.as_str()),
        }
    }

    pub fn as_option(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Only(value) => Some(value.as_str()),
        }
    }
}

impl FromStr for Selection {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Ok(Self::Only(raw.to_string()))
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_option().unwrap_or("all"))
    }
}

#[derive(Debug, Clone)]
pub struct MetricsQuery {
    pub counselor: Selection,
    pub window_days: i64,
    pub intake: Selection,
    pub as_of: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub counselor: Selection,
    pub intake: Selection,
}

/// Ids of students owned by `counselor_id`.
pub fn owned_student_ids<'a>(dataset: &'a Dataset, counselor_id: &str) -> HashSet<&'a str> {
    dataset
        .students
        .iter()
        .filter(|student| student.counselor_id.as_deref() == Some(counselor_id))
        .map(|student| student.id.as_str())
        .collect()
}

pub fn scoped_applications<'a>(dataset: &'a Dataset, query: &ReportQuery) -> Vec<&'a Application> {
    let owned = query
        .counselor
        .as_option()
        .map(|counselor_id| owned_student_ids(dataset, counselor_id));

    dataset
        .applications
        .iter()
        .filter(|application| match &owned {
            Some(owned) => application
                .student_id
                .as_deref()
                .is_some_and(|student_id| owned.contains(student_id)),
            None => true,
        })
        .filter(|application| query.intake.matches(application.intake.as_deref()))
        .collect()
}
