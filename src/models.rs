use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::timeline::lenient_datetime;

// Unrecognised, null and absent values all map to `Unknown`.
macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $($variant,)+
            #[default]
            Unknown,
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                    Self::Unknown => "unknown",
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Self::$variant,)+
                    _ => Self::Unknown,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = Option::<String>::deserialize(deserializer)?;
                Ok(raw.as_deref().map(Self::from).unwrap_or_default())
            }
        }
    };
}

status_enum!(
    StudentStatus {
        Lead => "lead",
        Prospect => "prospect",
        Active => "active",
        Applied => "applied",
        Converted => "converted",
        Enrolled => "enrolled",
        Inactive => "inactive",
    }
);

impl StudentStatus {
    pub fn is_converted(self) -> bool {
        matches!(self, Self::Converted | Self::Enrolled)
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Lead | Self::Prospect | Self::Active | Self::Applied | Self::Converted
        )
    }
}

status_enum!(
    InquiryStatus {
        New => "new",
        Contacted => "contacted",
        Converted => "converted",
        Lost => "lost",
    }
);

status_enum!(
    ApplicationStatus {
        Draft => "draft",
        Submitted => "submitted",
        UnderReview => "under_review",
        ConditionalOffer => "conditional_offer",
        UnconditionalOffer => "unconditional_offer",
        Enrolled => "enrolled",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
        Deferred => "deferred",
    }
);

impl ApplicationStatus {
    /// Statuses counted toward the application success rate.
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            Self::UnconditionalOffer | Self::ConditionalOffer | Self::Enrolled
        )
    }
}

status_enum!(
    VisaStatus {
        NotStarted => "not_started",
        Applied => "applied",
        Approved => "approved",
        Rejected => "rejected",
    }
);

status_enum!(
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
    }
);

status_enum!(
    Sentiment {
        Positive => "positive",
        Neutral => "neutral",
        Negative => "negative",
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counselor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specializations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub counselor_id: Option<String>,
    #[serde(default)]
    pub status: StudentStatus,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub profile_completeness: Option<u8>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub english_score: Option<f64>,
    #[serde(default)]
    pub preferred_degree_level: Option<String>,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub preferred_countries: Vec<String>,
    #[serde(default)]
    pub budget: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub status: InquiryStatus,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_date: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub updated_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub applied_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub intake: Option<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
    #[serde(default)]
    pub visa_status: VisaStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub counselor_id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub response_time_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub degree_level: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub min_gpa: Option<f64>,
    #[serde(default)]
    pub min_english: Option<f64>,
    #[serde(default)]
    pub tuition_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scholarship {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub degree_level: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub min_gpa: Option<f64>,
    #[serde(default)]
    pub min_english: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub counselors: Vec<Counselor>,
    #[serde(default)]
    pub students: Vec<StudentProfile>,
    #[serde(default)]
    pub inquiries: Vec<Inquiry>,
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub scholarships: Vec<Scholarship>,
}

impl Dataset {
    pub fn student(&self, id: &str) -> Option<&StudentProfile> {
        self.students.iter().find(|student| student.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_null_statuses_default() {
        let application: Application = serde_json::from_str(
            r#"{"id": "a1", "status": "on_hold", "visa_status": null}"#,
        )
        .unwrap();
        assert_eq!(application.status, ApplicationStatus::Unknown);
        assert_eq!(application.visa_status, VisaStatus::Unknown);
    }

    #[test]
    fn statuses_parse_case_insensitively() {
        assert_eq!(
            ApplicationStatus::from(" Conditional_Offer "),
            ApplicationStatus::ConditionalOffer
        );
        assert_eq!(TaskStatus::from("in_progress"), TaskStatus::InProgress);
        assert_eq!(StudentStatus::from("ENROLLED").as_str(), "enrolled");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let student: StudentProfile = serde_json::from_str(r#"{"id": "s1"}"#).unwrap();
        assert_eq!(student.counselor_id, None);
        assert_eq!(student.status, StudentStatus::Unknown);
        assert!(student.preferred_countries.is_empty());

        let dataset: Dataset = serde_json::from_str(r#"{"counselors": []}"#).unwrap();
        assert!(dataset.applications.is_empty());
    }

    #[test]
    fn unparseable_dates_become_none() {
        let inquiry: Inquiry = serde_json::from_str(
            r#"{"id": "i1", "created_date": "last tuesday", "updated_date": 42}"#,
        )
        .unwrap();
        assert_eq!(inquiry.created_date, None);
        assert_eq!(inquiry.updated_date, None);
    }

    #[test]
    fn status_serializes_as_backend_string() {
        let json = serde_json::to_string(&ApplicationStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
    }

    #[test]
    fn conversion_counts_enrolled_and_converted() {
        assert!(StudentStatus::Enrolled.is_converted());
        assert!(StudentStatus::Converted.is_converted());
        assert!(!StudentStatus::Applied.is_converted());
        assert!(!StudentStatus::Inactive.is_active());
    }
}
