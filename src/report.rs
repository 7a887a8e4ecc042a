use std::fmt::Write;

use crate::filters::MetricsQuery;
use crate::metrics::{self, CounselorMetrics};
use crate::tabulate::{MonthlyReport, Section, MONTHS};

fn format_hours(hours: Option<f64>) -> String {
    match hours {
        Some(hours) => format!("{hours:.1}h"),
        None => "no data".to_string(),
    }
}

pub fn build_report(
    query: &MetricsQuery,
    counselors: &[CounselorMetrics],
    monthly: &MonthlyReport,
) -> String {
    let summary = metrics::summarize(counselors);

    let mut output = String::new();
    let _ = writeln!(output, "# Counselor Performance Report");
    let _ = writeln!(
        output,
        "Generated for counselor {} / intake {} (last {} days, as of {})",
        query.counselor,
        query.intake,
        query.window_days,
        query.as_of.date()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Summary");

    if counselors.is_empty() {
        let _ = writeln!(output, "No counselors matched this filter.");
    } else {
        let _ = writeln!(
            output,
            "- Students: {} ({} active), conversion {}%",
            summary.total_students, summary.active_students, summary.conversion_rate
        );
        let _ = writeln!(
            output,
            "- Applications: {}, success rate {}%",
            summary.applications, summary.application_success_rate
        );
        let _ = writeln!(
            output,
            "- Tasks: {}/{} completed ({}%)",
            summary.tasks_completed, summary.tasks_total, summary.task_completion_rate
        );
        let _ = writeln!(
            output,
            "- Average response time: {}",
            format_hours(summary.avg_response_time)
        );
        let _ = writeln!(output, "- Satisfaction: not tracked");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Leaderboard");

    if counselors.is_empty() {
        let _ = writeln!(output, "No counselors matched this filter.");
    } else {
        let top = metrics::top_performer(counselors).map(|m| m.counselor_id.as_str());
        for counselor in metrics::leaderboard(counselors) {
            let marker = if Some(counselor.counselor_id.as_str()) == top {
                " (top performer)"
            } else {
                ""
            };
            let _ = writeln!(
                output,
                "- {}{}: conversion {}% of {} students, {} applications ({}% successful), \
                 tasks {}% done, {} overdue",
                counselor.counselor_name,
                marker,
                counselor.conversion_rate,
                counselor.total_students,
                counselor.applications_managed,
                counselor.application_success_rate,
                counselor.task_completion_rate,
                counselor.tasks_overdue
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Response Times");

    let mut responders: Vec<&CounselorMetrics> = counselors
        .iter()
        .filter(|m| m.avg_response_time.is_some_and(|hours| hours > 0.0))
        .collect();
    responders.sort_by(|a, b| {
        a.avg_response_time
            .partial_cmp(&b.avg_response_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if responders.is_empty() {
        let _ = writeln!(output, "No replies recorded yet.");
    } else {
        for counselor in responders {
            let _ = writeln!(
                output,
                "- {}: {} across {} messages",
                counselor.counselor_name,
                format_hours(counselor.avg_response_time),
                counselor.communications
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Applications {}", monthly.year);

    for section in Section::ALL {
        let _ = writeln!(output);
        let _ = writeln!(output, "| {} | {} | Total |", section.title(), MONTHS.join(" | "));
        let _ = writeln!(output, "|---{}|---|", "|---".repeat(MONTHS.len()));
        for row in monthly.section(section) {
            let counts: Vec<String> = row.months.iter().map(u32::to_string).collect();
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                row.category,
                counts.join(" | "),
                row.total()
            );
        }
    }

    if monthly.skipped > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "{} applications had no applied date in {} and were left out.",
            monthly.skipped, monthly.year
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::demo_dataset;
    use crate::filters::{scoped_applications, ReportQuery, Selection};
    use crate::tabulate::tabulate;
    use crate::timeline::parse_timestamp;

    fn query() -> MetricsQuery {
        MetricsQuery {
            counselor: Selection::All,
            window_days: 30,
            intake: Selection::All,
            as_of: parse_timestamp("2026-10-19T12:00:00").unwrap(),
        }
    }

    #[test]
    fn report_lists_team_and_monthly_matrix() {
        let query = query();
        let dataset = demo_dataset(query.as_of);
        let counselors = metrics::aggregate(&dataset, &query);
        let applications = scoped_applications(&dataset, &ReportQuery::default());
        let monthly = tabulate(applications, "2026".parse().unwrap());

        let report = build_report(&query, &counselors, &monthly);
        assert!(report.starts_with("# Counselor Performance Report"));
        assert!(report.contains("as of 2026-10-19"));
        assert!(report.contains("- Priya Shah (top performer): conversion 67%"));
        assert!(report.contains("- Priya Shah: 1.5h across 4 messages"));
        assert!(report.contains("| Visa Process | Jan | Feb |"));
        assert!(report.contains("| Student Joined |"));
        assert!(!report.contains("were left out"));
    }

    #[test]
    fn empty_inputs_render_placeholders() {
        let monthly = tabulate(std::iter::empty(), "2026".parse().unwrap());
        let report = build_report(&query(), &[], &monthly);
        assert!(report.contains("No counselors matched this filter."));
        assert!(report.contains("No replies recorded yet."));
        assert!(report.contains("| App Withdrawn | 0 | 0 |"));
    }
}
