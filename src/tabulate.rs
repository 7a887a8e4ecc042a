use std::str::FromStr;

use crate::error::ReportError;
use crate::models::{Application, ApplicationStatus, VisaStatus};
use crate::timeline::month_in_year;

pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    ApplicationStatus,
    VisaProcess,
    NegativeStatus,
}

impl Section {
    pub const ALL: [Section; 3] = [
        Section::ApplicationStatus,
        Section::VisaProcess,
        Section::NegativeStatus,
    ];

    pub const fn title(self) -> &'static str {
        match self {
            Self::ApplicationStatus => "Application Status",
            Self::VisaProcess => "Visa Process",
            Self::NegativeStatus => "Negative Status",
        }
    }
}

// Predicates are independent, so one application can count in several rows.
pub struct Category {
    pub name: &'static str,
    pub section: Section,
    matches: fn(&Application) -> bool,
}

fn application_sent(application: &Application) -> bool {
    matches!(
        application.status,
        ApplicationStatus::Submitted
            | ApplicationStatus::UnderReview
            | ApplicationStatus::ConditionalOffer
            | ApplicationStatus::UnconditionalOffer
    )
}

fn conditional_offer(application: &Application) -> bool {
    application.status == ApplicationStatus::ConditionalOffer
}

fn unconditional_offer(application: &Application) -> bool {
    application.status == ApplicationStatus::UnconditionalOffer
}

fn student_joined(application: &Application) -> bool {
    application.status == ApplicationStatus::Enrolled
}

fn visa_applied(application: &Application) -> bool {
    matches!(
        application.visa_status,
        VisaStatus::Applied | VisaStatus::Approved | VisaStatus::Rejected
    )
}

fn visa_granted(application: &Application) -> bool {
    application.visa_status == VisaStatus::Approved
}

fn visa_reject(application: &Application) -> bool {
    application.visa_status == VisaStatus::Rejected
}

fn app_rejection(application: &Application) -> bool {
    application.status == ApplicationStatus::Rejected
}

fn app_withdrawn(application: &Application) -> bool {
    application.status == ApplicationStatus::Withdrawn
}

fn app_deferred(application: &Application) -> bool {
    application.status == ApplicationStatus::Deferred
}

pub static CATEGORIES: [Category; 10] = [
    Category {
        name: "Application Sent",
        section: Section::ApplicationStatus,
        matches: application_sent,
    },
    Category {
        name: "Conditional Offer",
        section: Section::ApplicationStatus,
        matches: conditional_offer,
    },
    Category {
        name: "Unconditional Offer",
        section: Section::ApplicationStatus,
        matches: unconditional_offer,
    },
    Category {
        name: "Student Joined",
        section: Section::ApplicationStatus,
        matches: student_joined,
    },
    Category {
        name: "Visa Applied",
        section: Section::VisaProcess,
        matches: visa_applied,
    },
    Category {
        name: "Visa Granted",
        section: Section::VisaProcess,
        matches: visa_granted,
    },
    Category {
        name: "Visa Reject",
        section: Section::VisaProcess,
        matches: visa_reject,
    },
    Category {
        name: "App Rejection",
        section: Section::NegativeStatus,
        matches: app_rejection,
    },
    Category {
        name: "App Withdrawn",
        section: Section::NegativeStatus,
        matches: app_withdrawn,
    },
    Category {
        name: "App Deferred",
        section: Section::NegativeStatus,
        matches: app_deferred,
    },
];

/// A validated four-digit calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportYear(i32);

impl ReportYear {
    pub fn value(self) -> i32 {
        self.0
    }
}

impl FromStr for ReportYear {
    type Err = ReportError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.len() != 4 || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ReportError::InvalidYear(raw.to_string()));
        }

        trimmed
            .parse()
            .map(ReportYear)
            .map_err(|_| ReportError::InvalidYear(raw.to_string()))
    }
}

impl std::fmt::Display for ReportYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyRow {
    pub category: &'static str,
    pub section: Section,
    pub months: [u32; 12],
}

impl MonthlyRow {
    pub fn total(&self) -> u32 {
        self.months.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyReport {
    pub year: ReportYear,
    pub rows: Vec<MonthlyRow>,
    /// Applications left out because their date was missing or in another year.
    pub skipped: usize,
}

impl MonthlyReport {
    pub fn section(&self, section: Section) -> impl Iterator<Item = &MonthlyRow> {
        self.rows.iter().filter(move |row| row.section == section)
    }
}

pub fn tabulate<'a, I>(applications: I, year: ReportYear) -> MonthlyReport
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut rows: Vec<MonthlyRow> = CATEGORIES
        .iter()
        .map(|category| MonthlyRow {
            category: category.name,
            section: category.section,
            months: [0; 12],
        })
        .collect();
    let mut skipped = 0;

    for application in applications {
        let Some(month) = month_in_year(application.applied_date, year.value()) else {
            skipped += 1;
            continue;
        };

        for (row, category) in rows.iter_mut().zip(CATEGORIES.iter()) {
            if (category.matches)(application) {
                row.months[month] += 1;
            }
        }
    }

    tracing::debug!(%year, skipped, "tabulated monthly application report");

    MonthlyReport {
        year,
        rows,
        skipped,
    }
}
