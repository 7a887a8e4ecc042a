use serde::Serialize;

use crate::models::{Course, Scholarship, StudentProfile};

const OVER_BUDGET_PENALTY: i32 = 20;

pub trait Candidate {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn raw_score(&self, student: &StudentProfile) -> i32;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub id: String,
    pub name: String,
    pub score: u8,
}

/// A requirement the candidate leaves unset is met by everyone; a value the
/// student never provided meets nothing.
fn meets_minimum(student_value: Option<f64>, minimum: Option<f64>) -> bool {
    match (student_value, minimum) {
        (_, None) => true,
        (Some(value), Some(minimum)) => value >= minimum,
        (None, Some(_)) => false,
    }
}

fn same_label(student_value: Option<&str>, candidate_value: Option<&str>) -> bool {
    match (student_value, candidate_value) {
        (Some(student), Some(candidate)) => student.trim().eq_ignore_ascii_case(candidate.trim()),
        _ => false,
    }
}

fn related_field(student_field: Option<&str>, candidate_field: &str) -> bool {
    let Some(student_field) = student_field else {
        return false;
    };
    let student_field = student_field.trim().to_lowercase();
    let candidate_field = candidate_field.trim().to_lowercase();
    if student_field.is_empty() || candidate_field.is_empty() {
        return false;
    }
    student_field.contains(&candidate_field) || candidate_field.contains(&student_field)
}

fn preferred_country(student: &StudentProfile, country: Option<&str>) -> bool {
    country.is_some_and(|country| {
        student
            .preferred_countries
            .iter()
            .any(|preferred| preferred.trim().eq_ignore_ascii_case(country.trim()))
    })
}

impl Candidate for Course {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn raw_score(&self, student: &StudentProfile) -> i32 {
        let mut score = 0;
        if meets_minimum(student.gpa, self.min_gpa) {
            score += 25;
        }
        if meets_minimum(student.english_score, self.min_english) {
            score += 20;
        }
        if same_label(
            student.preferred_degree_level.as_deref(),
            self.degree_level.as_deref(),
        ) {
            score += 20;
        }
        if self
            .field
            .as_deref()
            .is_some_and(|field| related_field(student.field_of_study.as_deref(), field))
        {
            score += 20;
        }
        if preferred_country(student, self.country.as_deref()) {
            score += 15;
        }
        if let (Some(budget), Some(fee)) = (student.budget, self.tuition_fee) {
            if fee > budget {
                score -= OVER_BUDGET_PENALTY;
            }
        }
        score
    }
}

impl Candidate for Scholarship {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn raw_score(&self, student: &StudentProfile) -> i32 {
        let mut score = 0;
        if meets_minimum(student.gpa, self.min_gpa) {
            score += 30;
        }
        if meets_minimum(student.english_score, self.min_english) {
            score += 15;
        }
        if same_label(
            student.preferred_degree_level.as_deref(),
            self.degree_level.as_deref(),
        ) {
            score += 20;
        }
        if self
            .fields
            .iter()
            .any(|field| related_field(student.field_of_study.as_deref(), field))
        {
            score += 20;
        }
        if preferred_country(student, self.country.as_deref()) {
            score += 15;
        }
        score
    }
}

pub fn score<C: Candidate>(candidate: &C, student: &StudentProfile) -> u8 {
    candidate.raw_score(student).clamp(0, 100) as u8
}

/// The `top` best candidates for `student`, highest score first. Equal scores
/// keep catalog order.
pub fn rank<C: Candidate>(
    candidates: &[C],
    student: &StudentProfile,
    top: usize,
) -> Vec<MatchResult> {
    let mut results: Vec<MatchResult> = candidates
        .iter()
        .map(|candidate| MatchResult {
            id: candidate.id().to_string(),
            name: candidate.name().to_string(),
            score: score(candidate, student),
        })
        .collect();

    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(top);
    results
}
