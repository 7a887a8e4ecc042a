use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::filters::{owned_student_ids, MetricsQuery};
use crate::models::{
    Application, Counselor, Dataset, Inquiry, InquiryStatus, Message, Sentiment, StudentProfile,
    TaskStatus,
};
use crate::timeline::{cutoff_date, hours_between, within_window};

/// Integer percentage of `successes` over `total`, 0 when there is nothing to divide by.
pub fn rate(successes: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }

    let value = (successes as f64 * 100.0 / total as f64).round();
    value.clamp(0.0, 100.0) as u32
}

/// Student satisfaction is not captured anywhere in the CRM yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Satisfaction {
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselorMetrics {
    pub counselor_id: String,
    pub counselor_name: String,
    pub specializations: Vec<String>,
    pub total_students: usize,
    pub active_students: usize,
    pub converted_students: usize,
    pub conversion_rate: u32,
    pub inquiries: usize,
    pub converted_inquiries: usize,
    pub inquiry_conversion_rate: u32,
    pub applications_managed: usize,
    pub successful_applications: usize,
    pub application_success_rate: u32,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub tasks_overdue: usize,
    pub task_completion_rate: u32,
    pub communications: usize,
    /// Mean hours between a student message and the counselor's reply.
    #[serde(serialize_with = "serialize_hours")]
    pub avg_response_time: Option<f64>,
    pub positive_sentiment_rate: u32,
    pub satisfaction: Satisfaction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub counselors: usize,
    pub total_students: usize,
    pub active_students: usize,
    pub converted_students: usize,
    pub conversion_rate: u32,
    pub applications: usize,
    pub successful_applications: usize,
    pub application_success_rate: u32,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub task_completion_rate: u32,
    pub communications: usize,
    #[serde(serialize_with = "serialize_hours")]
    pub avg_response_time: Option<f64>,
    pub top_performer: Option<String>,
    pub fastest_responder: Option<String>,
}

fn round_hours(hours: f64) -> f64 {
    (hours * 10.0).round() / 10.0
}

fn serialize_hours<S>(hours: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    hours.map(round_hours).serialize(serializer)
}

pub fn aggregate(dataset: &Dataset, query: &MetricsQuery) -> Vec<CounselorMetrics> {
    let cutoff = cutoff_date(query.as_of, query.window_days);

    let metrics: Vec<CounselorMetrics> = dataset
        .counselors
        .iter()
        .filter(|counselor| query.counselor.matches(Some(counselor.id.as_str())))
        .map(|counselor| counselor_metrics(dataset, counselor, query, cutoff))
        .collect();

    tracing::debug!(
        counselors = metrics.len(),
        students = dataset.students.len(),
        applications = dataset.applications.len(),
        %cutoff,
        "aggregated counselor metrics"
    );

    metrics
}

fn counselor_metrics(
    dataset: &Dataset,
    counselor: &Counselor,
    query: &MetricsQuery,
    cutoff: NaiveDateTime,
) -> CounselorMetrics {
    let id = counselor.id.as_str();

    let students: Vec<&StudentProfile> = dataset
        .students
        .iter()
        .filter(|student| student.counselor_id.as_deref() == Some(id))
        .collect();
    let owned = owned_student_ids(dataset, id);
    let converted_students = students
        .iter()
        .filter(|student| student.status.is_converted())
        .count();
    let active_students = students
        .iter()
        .filter(|student| student.status.is_active())
        .count();

    let inquiries: Vec<&Inquiry> = dataset
        .inquiries
        .iter()
        .filter(|inquiry| inquiry.assigned_to.as_deref() == Some(id))
        .filter(|inquiry| within_window(inquiry.created_date, cutoff))
        .collect();
    let converted_inquiries = inquiries
        .iter()
        .filter(|inquiry| inquiry.status == InquiryStatus::Converted)
        .count();

    let applications: Vec<&Application> = dataset
        .applications
        .iter()
        .filter(|application| {
            application
                .student_id
                .as_deref()
                .is_some_and(|student_id| owned.contains(student_id))
        })
        .filter(|application| within_window(application.applied_date, cutoff))
        .filter(|application| query.intake.matches(application.intake.as_deref()))
        .collect();
    let successful_applications = applications
        .iter()
        .filter(|application| application.status.is_successful())
        .count();

    let mut tasks_total = 0;
    let mut tasks_completed = 0;
    let mut tasks_overdue = 0;
    for task in dataset
        .tasks
        .iter()
        .filter(|task| task.assigned_to.as_deref() == Some(id))
    {
        tasks_total += 1;
        if task.status == TaskStatus::Completed {
            tasks_completed += 1;
        } else if task.due_date.is_some_and(|due| due < query.as_of) {
            tasks_overdue += 1;
        }
    }

    let messages: Vec<&Message> = dataset
        .messages
        .iter()
        .filter(|message| message.counselor_id.as_deref() == Some(id))
        .collect();
    let with_sentiment = messages
        .iter()
        .filter(|message| message.sentiment != Sentiment::Unknown)
        .count();
    let positive = messages
        .iter()
        .filter(|message| message.sentiment == Sentiment::Positive)
        .count();

    CounselorMetrics {
        counselor_id: counselor.id.clone(),
        counselor_name: counselor.name.clone(),
        specializations: counselor.specializations.clone(),
        total_students: students.len(),
        active_students,
        converted_students,
        conversion_rate: rate(converted_students, students.len()),
        inquiries: inquiries.len(),
        converted_inquiries,
        inquiry_conversion_rate: rate(converted_inquiries, inquiries.len()),
        applications_managed: applications.len(),
        successful_applications,
        application_success_rate: rate(successful_applications, applications.len()),
        tasks_total,
        tasks_completed,
        tasks_overdue,
        task_completion_rate: rate(tasks_completed, tasks_total),
        communications: messages.len(),
        avg_response_time: average_hours(&response_samples(id, &messages)),
        positive_sentiment_rate: rate(positive, with_sentiment),
        satisfaction: Satisfaction::Unavailable,
    }
}

/// Reply latencies in hours, measured from the nearest earlier student
/// message in the same thread.
pub fn response_samples(counselor_id: &str, messages: &[&Message]) -> Vec<f64> {
    let mut threads: BTreeMap<&str, Vec<&Message>> = BTreeMap::new();
    for message in messages {
        if let Some(student_id) = message.student_id.as_deref() {
            threads.entry(student_id).or_default().push(*message);
        }
    }

    let mut samples = Vec::new();
    for (student_id, thread) in threads {
        let mut asked: Vec<NaiveDateTime> = thread
            .iter()
            .filter(|message| message.sender_id.as_deref() == Some(student_id))
            .filter_map(|message| message.created_date)
            .collect();
        asked.sort_unstable();

        for reply in thread
            .iter()
            .filter(|message| message.sender_id.as_deref() == Some(counselor_id))
        {
            let Some(sent_at) = reply.created_date else {
                continue;
            };

            let preceding = asked.partition_point(|at| *at < sent_at);
            if preceding > 0 {
                samples.push(hours_between(asked[preceding - 1], sent_at));
            } else if let Some(minutes) = reply.response_time_minutes {
                samples.push(f64::from(minutes) / 60.0);
            }
        }
    }

    samples
}

pub fn average_hours(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Highest conversion rate; on ties the first counselor encountered wins.
pub fn top_performer(metrics: &[CounselorMetrics]) -> Option<&CounselorMetrics> {
    let (first, rest) = metrics.split_first()?;
    Some(rest.iter().fold(first, |best, candidate| {
        if candidate.conversion_rate > best.conversion_rate {
            candidate
        } else {
            best
        }
    }))
}

/// Lowest positive average response time. Counselors without samples are
/// not candidates.
pub fn fastest_responder(metrics: &[CounselorMetrics]) -> Option<&CounselorMetrics> {
    let mut best: Option<(&CounselorMetrics, f64)> = None;
    for candidate in metrics {
        let Some(hours) = candidate.avg_response_time.filter(|hours| *hours > 0.0) else {
            continue;
        };
        match best {
            Some((_, best_hours)) if best_hours <= hours => {}
            _ => best = Some((candidate, hours)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

pub fn leaderboard(metrics: &[CounselorMetrics]) -> Vec<&CounselorMetrics> {
    let mut ranked: Vec<&CounselorMetrics> = metrics.iter().collect();
    ranked.sort_by(|a, b| b.conversion_rate.cmp(&a.conversion_rate));
    ranked
}

pub fn summarize(metrics: &[CounselorMetrics]) -> TeamSummary {
    let total_students = metrics.iter().map(|m| m.total_students).sum();
    let converted_students = metrics.iter().map(|m| m.converted_students).sum();
    let applications = metrics.iter().map(|m| m.applications_managed).sum();
    let successful_applications = metrics.iter().map(|m| m.successful_applications).sum();
    let tasks_total = metrics.iter().map(|m| m.tasks_total).sum();
    let tasks_completed = metrics.iter().map(|m| m.tasks_completed).sum();
    let response_times: Vec<f64> = metrics.iter().filter_map(|m| m.avg_response_time).collect();

    TeamSummary {
        counselors: metrics.len(),
        total_students,
        active_students: metrics.iter().map(|m| m.active_students).sum(),
        converted_students,
        conversion_rate: rate(converted_students, total_students),
        applications,
        successful_applications,
        application_success_rate: rate(successful_applications, applications),
        tasks_total,
        tasks_completed,
        task_completion_rate: rate(tasks_completed, tasks_total),
        communications: metrics.iter().map(|m| m.communications).sum(),
        avg_response_time: average_hours(&response_times),
        top_performer: top_performer(metrics).map(|m| m.counselor_id.clone()),
        fastest_responder: fastest_responder(metrics).map(|m| m.counselor_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Selection;
    use crate::models::{ApplicationStatus, StudentStatus, Task};
    use crate::timeline::parse_timestamp;
    use pretty_assertions::assert_eq;

    fn at(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    fn query() -> MetricsQuery {
        MetricsQuery {
            counselor: Selection::All,
            window_days: 30,
            intake: Selection::All,
            as_of: at("2026-10-19T12:00:00"),
        }
    }

    fn counselor(id: &str) -> Counselor {
        Counselor {
            id: id.to_string(),
            name: format!("Counselor {id}"),
            specializations: vec!["UK".to_string()],
        }
    }

    fn students(counselor: &str, total: usize, enrolled: usize) -> Vec<StudentProfile> {
        (0..total)
            .map(|index| StudentProfile {
                id: format!("{counselor}-s{index}"),
                counselor_id: Some(counselor.to_string()),
                status: if index < enrolled {
                    StudentStatus::Enrolled
                } else {
                    StudentStatus::Active
                },
                ..Default::default()
            })
            .collect()
    }

    fn application(student: &str, status: ApplicationStatus, applied: &str) -> Application {
        Application {
            id: format!("app-{student}-{applied}"),
            student_id: Some(student.to_string()),
            status,
            applied_date: parse_timestamp(applied),
            intake: Some("September 2026".to_string()),
            ..Default::default()
        }
    }

    fn message(student: &str, counselor: &str, sender: &str, sent: &str) -> Message {
        Message {
            id: format!("m-{sender}-{sent}"),
            student_id: Some(student.to_string()),
            counselor_id: Some(counselor.to_string()),
            sender_id: Some(sender.to_string()),
            created_date: parse_timestamp(sent),
            ..Default::default()
        }
    }

    fn scenario() -> Dataset {
        let mut dataset = Dataset {
            counselors: vec![counselor("a"), counselor("b"), counselor("c")],
            ..Default::default()
        };
        dataset.students.extend(students("a", 10, 7));
        dataset.students.extend(students("c", 4, 1));
        dataset
    }

    #[test]
    fn conversion_rate_scenario() {
        let metrics = aggregate(&scenario(), &query());
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].conversion_rate, 70);
        assert_eq!(metrics[1].conversion_rate, 0);
        assert_eq!(metrics[1].total_students, 0);
        assert_eq!(metrics[2].conversion_rate, 25);
        assert_eq!(top_performer(&metrics).unwrap().counselor_id, "a");
    }

    #[test]
    fn zero_students_never_divides() {
        let dataset = Dataset {
            counselors: vec![counselor("lonely")],
            ..Default::default()
        };
        let metrics = aggregate(&dataset, &query());
        let only = &metrics[0];
        assert_eq!(only.conversion_rate, 0);
        assert_eq!(only.application_success_rate, 0);
        assert_eq!(only.task_completion_rate, 0);
        assert_eq!(only.inquiry_conversion_rate, 0);
        assert_eq!(only.avg_response_time, None);
        assert_eq!(only.satisfaction, Satisfaction::Unavailable);
    }

    #[test]
    fn rates_stay_within_bounds() {
        for total in 0..25 {
            for successes in 0..=total {
                let value = rate(successes, total);
                assert!(value <= 100, "{successes}/{total} gave {value}");
            }
        }
        assert_eq!(rate(1, 3), 33);
        assert_eq!(rate(2, 3), 67);
        assert_eq!(rate(1, 8), 13);
    }

    #[test]
    fn top_performer_ties_favor_first_seen() {
        let dataset = Dataset {
            counselors: vec![counselor("x"), counselor("y")],
            ..Default::default()
        };
        let metrics = aggregate(&dataset, &query());
        assert_eq!(top_performer(&metrics).unwrap().counselor_id, "x");
        assert!(top_performer(&[]).is_none());

        let mut dataset = scenario();
        dataset.students.extend(students("b", 10, 7));
        let metrics = aggregate(&dataset, &query());
        assert_eq!(top_performer(&metrics).unwrap().counselor_id, "a");
        let ranked: Vec<_> = leaderboard(&metrics)
            .iter()
            .map(|m| m.counselor_id.as_str())
            .collect();
        assert_eq!(ranked, vec!["a", "b", "c"]);
    }

    #[test]
    fn counselor_filter_selects_one_or_none() {
        let mut filtered = query();
        filtered.counselor = Selection::Only("c".to_string());
        let metrics = aggregate(&scenario(), &filtered);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].counselor_id, "c");

        filtered.counselor = Selection::Only("nobody".to_string());
        assert!(aggregate(&scenario(), &filtered).is_empty());
    }

    #[test]
    fn applications_use_rolling_window_and_intake() {
        let mut dataset = scenario();
        dataset.applications = vec![
            application("a-s0", ApplicationStatus::ConditionalOffer, "2026-10-01"),
            application("a-s1", ApplicationStatus::Rejected, "2026-10-10"),
            application("a-s2", ApplicationStatus::Enrolled, "2026-09-19T12:00:00"),
            application("a-s3", ApplicationStatus::Enrolled, "2026-08-01"),
            application("a-s4", ApplicationStatus::Enrolled, "not a date"),
            application("ghost", ApplicationStatus::Enrolled, "2026-10-01"),
        ];
        dataset.applications[1].intake = Some("January 2027".to_string());

        let metrics = aggregate(&dataset, &query());
        assert_eq!(metrics[0].applications_managed, 3);
        assert_eq!(metrics[0].successful_applications, 2);
        assert_eq!(metrics[0].application_success_rate, 67);

        let mut scoped = query();
        scoped.intake = Selection::Only("September 2026".to_string());
        let metrics = aggregate(&dataset, &scoped);
        assert_eq!(metrics[0].applications_managed, 2);
        assert_eq!(metrics[0].application_success_rate, 100);
    }

    #[test]
    fn inquiries_are_windowed_and_converted_counted() {
        let mut dataset = scenario();
        dataset.inquiries = vec![
            Inquiry {
                id: "i1".to_string(),
                assigned_to: Some("b".to_string()),
                status: InquiryStatus::Converted,
                created_date: Some(at("2026-10-18")),
                updated_date: None,
            },
            Inquiry {
                id: "i2".to_string(),
                assigned_to: Some("b".to_string()),
                status: InquiryStatus::Contacted,
                created_date: Some(at("2026-10-02")),
                updated_date: None,
            },
            Inquiry {
                id: "i3".to_string(),
                assigned_to: Some("b".to_string()),
                status: InquiryStatus::Converted,
                created_date: Some(at("2025-01-01")),
                updated_date: None,
            },
        ];

        let metrics = aggregate(&dataset, &query());
        assert_eq!(metrics[1].inquiries, 2);
        assert_eq!(metrics[1].converted_inquiries, 1);
        assert_eq!(metrics[1].inquiry_conversion_rate, 50);
    }

    #[test]
    fn tasks_count_completion_and_overdue() {
        let mut dataset = scenario();
        let task = |id: &str, status: TaskStatus, due: &str| Task {
            id: id.to_string(),
            assigned_to: Some("a".to_string()),
            status,
            due_date: parse_timestamp(due),
            ..Default::default()
        };
        dataset.tasks = vec![
            task("t1", TaskStatus::Completed, "2026-10-01"),
            task("t2", TaskStatus::Pending, "2026-10-01"),
            task("t3", TaskStatus::InProgress, "2026-11-01"),
            task("t4", TaskStatus::Completed, ""),
        ];

        let metrics = aggregate(&dataset, &query());
        assert_eq!(metrics[0].tasks_total, 4);
        assert_eq!(metrics[0].tasks_completed, 2);
        assert_eq!(metrics[0].tasks_overdue, 1);
        assert_eq!(metrics[0].task_completion_rate, 50);
    }

    #[test]
    fn response_time_uses_nearest_prior_student_message() {
        let thread = vec![
            message("s1", "a", "s1", "2026-10-01T00:00:00"),
            message("s1", "a", "s1", "2026-10-01T05:00:00"),
            message("s1", "a", "a", "2026-10-01T06:00:00"),
        ];
        let refs: Vec<&Message> = thread.iter().collect();
        assert_eq!(response_samples("a", &refs), vec![1.0]);
    }

    #[test]
    fn response_time_ignores_other_threads_and_later_messages() {
        let messages = vec![
            message("s2", "a", "s2", "2026-10-01T05:30:00"),
            message("s1", "a", "a", "2026-10-01T06:00:00"),
            message("s1", "a", "s1", "2026-10-01T07:00:00"),
            message("s1", "a", "s1", "2026-10-01T02:00:00"),
            message("s1", "a", "a", "2026-10-01T09:00:00"),
        ];
        let refs: Vec<&Message> = messages.iter().collect();
        let samples = response_samples("a", &refs);
        assert_eq!(samples, vec![4.0, 2.0]);
    }

    #[test]
    fn recorded_minutes_cover_replies_without_a_prompt() {
        let mut opener = message("s1", "a", "a", "2026-10-01T06:00:00");
        opener.response_time_minutes = Some(90);
        let unprompted = message("s1", "a", "a", "2026-10-01T07:00:00");
        let messages = [opener, unprompted];
        let refs: Vec<&Message> = messages.iter().collect();
        assert_eq!(response_samples("a", &refs), vec![1.5]);
    }

    #[test]
    fn fastest_responder_skips_counselors_without_samples() {
        let mut dataset = scenario();
        dataset.messages = vec![
            message("c-s0", "c", "c-s0", "2026-10-01T00:00:00"),
            message("c-s0", "c", "c", "2026-10-01T03:00:00"),
            message("a-s0", "a", "a-s0", "2026-10-01T00:00:00"),
            message("a-s0", "a", "a", "2026-10-01T08:00:00"),
        ];

        let metrics = aggregate(&dataset, &query());
        assert_eq!(metrics[0].avg_response_time, Some(8.0));
        assert_eq!(metrics[1].avg_response_time, None);
        assert_eq!(metrics[2].avg_response_time, Some(3.0));
        assert_eq!(fastest_responder(&metrics).unwrap().counselor_id, "c");

        let summary = summarize(&metrics);
        assert_eq!(summary.fastest_responder.as_deref(), Some("c"));
        assert_eq!(summary.avg_response_time, Some(5.5));
        assert_eq!(summary.communications, 4);
    }

    #[test]
    fn replies_within_minutes_still_rank_fastest() {
        let mut dataset = scenario();
        dataset.messages = vec![
            message("a-s0", "a", "a-s0", "2026-10-01T00:00:00"),
            message("a-s0", "a", "a", "2026-10-01T05:00:00"),
            message("c-s0", "c", "c-s0", "2026-10-01T00:00:00"),
            message("c-s0", "c", "c", "2026-10-01T00:02:00"),
        ];

        let metrics = aggregate(&dataset, &query());
        let quick = metrics[2].avg_response_time.unwrap();
        assert!(quick > 0.0 && quick < 0.05, "got {quick}");
        assert_eq!(fastest_responder(&metrics).unwrap().counselor_id, "c");

        let json = serde_json::to_value(&metrics[2]).unwrap();
        assert_eq!(json["avgResponseTime"], 0.0);
    }

    #[test]
    fn sentiment_rate_ignores_unlabelled_messages() {
        let mut dataset = scenario();
        let mut positive = message("a-s0", "a", "a-s0", "2026-10-01T00:00:00");
        positive.sentiment = Sentiment::Positive;
        let mut negative = message("a-s0", "a", "a-s0", "2026-10-02T00:00:00");
        negative.sentiment = Sentiment::Negative;
        let unlabelled = message("a-s0", "a", "a", "2026-10-03T00:00:00");
        dataset.messages = vec![positive, negative, unlabelled];

        let metrics = aggregate(&dataset, &query());
        assert_eq!(metrics[0].communications, 3);
        assert_eq!(metrics[0].positive_sentiment_rate, 50);
    }

    #[test]
    fn team_summary_recomputes_rates_over_totals() {
        let summary = summarize(&aggregate(&scenario(), &query()));
        assert_eq!(summary.counselors, 3);
        assert_eq!(summary.total_students, 14);
        assert_eq!(summary.converted_students, 8);
        assert_eq!(summary.conversion_rate, 57);
        assert_eq!(summary.top_performer.as_deref(), Some("a"));
        assert_eq!(summary.fastest_responder, None);
        assert_eq!(summary.avg_response_time, None);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let mut dataset = scenario();
        dataset.messages = vec![
            message("a-s0", "a", "a-s0", "2026-10-01T00:00:00"),
            message("a-s0", "a", "a", "2026-10-01T02:20:00"),
            message("a-s1", "a", "a-s1", "2026-10-01T00:00:00"),
            message("a-s1", "a", "a", "2026-10-01T01:10:00"),
        ];
        let first = aggregate(&dataset, &query());
        let second = aggregate(&dataset, &query());
        assert_eq!(first, second);
    }

    #[test]
    fn serializes_with_dashboard_field_names() {
        let metrics = aggregate(&scenario(), &query());
        let json = serde_json::to_value(&metrics[0]).unwrap();
        assert_eq!(json["conversionRate"], 70);
        assert_eq!(json["avgResponseTime"], serde_json::Value::Null);
        assert_eq!(json["satisfaction"], "unavailable");
    }
}
