use std::path::Path;

use anyhow::Context;
use chrono::{Duration, NaiveDateTime};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::{
    Application, ApplicationStatus, Counselor, Course, Dataset, Inquiry, InquiryStatus, Message,
    Scholarship, Sentiment, StudentProfile, StudentStatus, Task, TaskStatus, VisaStatus,
};
use crate::snapshot;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<u64> {
    let now = chrono::Utc::now().naive_utc();
    import_dataset(pool, &demo_dataset(now)).await
}

pub async fn import_snapshot(pool: &PgPool, path: &Path) -> anyhow::Result<u64> {
    let dataset = snapshot::load(path)?;
    import_dataset(pool, &dataset).await
}

/// Insert every record of `dataset`, skipping ids that already exist.
/// Returns the number of rows written.
pub async fn import_dataset(pool: &PgPool, dataset: &Dataset) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for counselor in &dataset.counselors {
        inserted += insert_counselor(&mut tx, counselor).await?;
    }
    for student in &dataset.students {
        inserted += insert_student(&mut tx, student).await?;
    }
    for inquiry in &dataset.inquiries {
        inserted += insert_inquiry(&mut tx, inquiry).await?;
    }
    for application in &dataset.applications {
        inserted += insert_application(&mut tx, application).await?;
    }
    for task in &dataset.tasks {
        inserted += insert_task(&mut tx, task).await?;
    }
    for message in &dataset.messages {
        inserted += insert_message(&mut tx, message).await?;
    }
    for course in &dataset.courses {
        inserted += insert_course(&mut tx, course).await?;
    }
    for scholarship in &dataset.scholarships {
        inserted += insert_scholarship(&mut tx, scholarship).await?;
    }

    tx.commit().await.context("failed to commit import")?;
    tracing::info!(inserted, "imported dataset");
    Ok(inserted)
}

async fn insert_counselor(
    tx: &mut Transaction<'_, Postgres>,
    counselor: &Counselor,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.counselors (id, name, specializations)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&counselor.id)
    .bind(&counselor.name)
    .bind(&counselor.specializations)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert counselor {}", counselor.id))?;
    Ok(result.rows_affected())
}

async fn insert_student(
    tx: &mut Transaction<'_, Postgres>,
    student: &StudentProfile,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.student_profiles
        (id, full_name, counselor_id, status, created_date, profile_completeness,
         gpa, english_score, preferred_degree_level, field_of_study,
         preferred_countries, budget)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&student.id)
    .bind(&student.full_name)
    .bind(&student.counselor_id)
    .bind(student.status.as_str())
    .bind(student.created_date)
    .bind(student.profile_completeness.map(i16::from))
    .bind(student.gpa)
    .bind(student.english_score)
    .bind(&student.preferred_degree_level)
    .bind(&student.field_of_study)
    .bind(&student.preferred_countries)
    .bind(student.budget)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert student {}", student.id))?;
    Ok(result.rows_affected())
}

async fn insert_inquiry(
    tx: &mut Transaction<'_, Postgres>,
    inquiry: &Inquiry,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.inquiries (id, assigned_to, status, created_date, updated_date)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&inquiry.id)
    .bind(&inquiry.assigned_to)
    .bind(inquiry.status.as_str())
    .bind(inquiry.created_date)
    .bind(inquiry.updated_date)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert inquiry {}", inquiry.id))?;
    Ok(result.rows_affected())
}

async fn insert_application(
    tx: &mut Transaction<'_, Postgres>,
    application: &Application,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.applications
        (id, student_id, status, applied_date, intake, milestones, visa_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&application.id)
    .bind(&application.student_id)
    .bind(application.status.as_str())
    .bind(application.applied_date)
    .bind(&application.intake)
    .bind(&application.milestones)
    .bind(application.visa_status.as_str())
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert application {}", application.id))?;
    Ok(result.rows_affected())
}

async fn insert_task(tx: &mut Transaction<'_, Postgres>, task: &Task) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.tasks (id, assigned_to, student_id, status, due_date, priority)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&task.id)
    .bind(&task.assigned_to)
    .bind(&task.student_id)
    .bind(task.status.as_str())
    .bind(task.due_date)
    .bind(&task.priority)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert task {}", task.id))?;
    Ok(result.rows_affected())
}

async fn insert_message(
    tx: &mut Transaction<'_, Postgres>,
    message: &Message,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.messages
        (id, student_id, counselor_id, sender_id, created_date, sentiment, response_time_minutes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&message.id)
    .bind(&message.student_id)
    .bind(&message.counselor_id)
    .bind(&message.sender_id)
    .bind(message.created_date)
    .bind((message.sentiment != Sentiment::Unknown).then(|| message.sentiment.as_str()))
    .bind(
        message
            .response_time_minutes
            .and_then(|minutes| i32::try_from(minutes).ok()),
    )
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert message {}", message.id))?;
    Ok(result.rows_affected())
}

async fn insert_course(tx: &mut Transaction<'_, Postgres>, course: &Course) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.courses
        (id, name, university, country, degree_level, field, min_gpa, min_english, tuition_fee)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&course.id)
    .bind(&course.name)
    .bind(&course.university)
    .bind(&course.country)
    .bind(&course.degree_level)
    .bind(&course.field)
    .bind(course.min_gpa)
    .bind(course.min_english)
    .bind(course.tuition_fee)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert course {}", course.id))?;
    Ok(result.rows_affected())
}

async fn insert_scholarship(
    tx: &mut Transaction<'_, Postgres>,
    scholarship: &Scholarship,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alo_crm.scholarships
        (id, name, country, degree_level, fields, min_gpa, min_english, amount)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&scholarship.id)
    .bind(&scholarship.name)
    .bind(&scholarship.country)
    .bind(&scholarship.degree_level)
    .bind(&scholarship.fields)
    .bind(scholarship.min_gpa)
    .bind(scholarship.min_english)
    .bind(scholarship.amount)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to insert scholarship {}", scholarship.id))?;
    Ok(result.rows_affected())
}

const COUNSELORS_SQL: &str =
    "SELECT id, name, specializations FROM alo_crm.counselors \
     ORDER BY created_date DESC, id LIMIT $1";

const STUDENTS_SQL: &str =
    "SELECT id, full_name, counselor_id, status, created_date, profile_completeness, \
     gpa, english_score, preferred_degree_level, field_of_study, preferred_countries, \
     budget FROM alo_crm.student_profiles \
     ORDER BY created_date DESC NULLS LAST, id LIMIT $1";

const INQUIRIES_SQL: &str =
    "SELECT id, assigned_to, status, created_date, updated_date FROM alo_crm.inquiries \
     ORDER BY created_date DESC NULLS LAST, id LIMIT $1";

const APPLICATIONS_SQL: &str =
    "SELECT id, student_id, status, applied_date, intake, milestones, visa_status \
     FROM alo_crm.applications ORDER BY created_date DESC, id LIMIT $1";

const TASKS_SQL: &str =
    "SELECT id, assigned_to, student_id, status, due_date, priority FROM alo_crm.tasks \
     ORDER BY created_date DESC, id LIMIT $1";

const MESSAGES_SQL: &str =
    "SELECT id, student_id, counselor_id, sender_id, created_date, sentiment, \
     response_time_minutes FROM alo_crm.messages \
     ORDER BY created_date DESC NULLS LAST, id LIMIT $1";

const COURSES_SQL: &str =
    "SELECT id, name, university, country, degree_level, field, min_gpa, min_english, \
     tuition_fee FROM alo_crm.courses ORDER BY created_date DESC, id LIMIT $1";

const SCHOLARSHIPS_SQL: &str =
    "SELECT id, name, country, degree_level, fields, min_gpa, min_english, amount \
     FROM alo_crm.scholarships ORDER BY created_date DESC, id LIMIT $1";

#[cfg(test)]
const FETCH_QUERIES: [&str; 8] = [
    COUNSELORS_SQL,
    STUDENTS_SQL,
    INQUIRIES_SQL,
    APPLICATIONS_SQL,
    TASKS_SQL,
    MESSAGES_SQL,
    COURSES_SQL,
    SCHOLARSHIPS_SQL,
];

/// Fetch the latest `limit` rows of every collection, newest first.
pub async fn fetch_dataset(pool: &PgPool, limit: usize) -> anyhow::Result<Dataset> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let dataset = Dataset {
        counselors: fetch(pool, COUNSELORS_SQL, limit, counselor_from_row).await?,
        students: fetch(pool, STUDENTS_SQL, limit, student_from_row).await?,
        inquiries: fetch(pool, INQUIRIES_SQL, limit, inquiry_from_row).await?,
        applications: fetch(pool, APPLICATIONS_SQL, limit, application_from_row).await?,
        tasks: fetch(pool, TASKS_SQL, limit, task_from_row).await?,
        messages: fetch(pool, MESSAGES_SQL, limit, message_from_row).await?,
        courses: fetch(pool, COURSES_SQL, limit, course_from_row).await?,
        scholarships: fetch(pool, SCHOLARSHIPS_SQL, limit, scholarship_from_row).await?,
    };

    tracing::debug!(
        counselors = dataset.counselors.len(),
        students = dataset.students.len(),
        applications = dataset.applications.len(),
        messages = dataset.messages.len(),
        "fetched dataset"
    );

    Ok(dataset)
}

async fn fetch<T>(
    pool: &PgPool,
    sql: &str,
    limit: i64,
    map: fn(&PgRow) -> T,
) -> anyhow::Result<Vec<T>> {
    let rows = sqlx::query(sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .with_context(|| format!("query failed: {sql}"))?;
    Ok(rows.iter().map(map).collect())
}

fn status<S: for<'a> From<&'a str> + Default>(row: &PgRow, column: &str) -> S {
    row.get::<Option<String>, _>(column)
        .as_deref()
        .map(S::from)
        .unwrap_or_default()
}

fn counselor_from_row(row: &PgRow) -> Counselor {
    Counselor {
        id: row.get("id"),
        name: row.get("name"),
        specializations: row.get("specializations"),
    }
}

fn student_from_row(row: &PgRow) -> StudentProfile {
    StudentProfile {
        id: row.get("id"),
        full_name: row.get("full_name"),
        counselor_id: row.get("counselor_id"),
        status: status::<StudentStatus>(row, "status"),
        created_date: row.get("created_date"),
        profile_completeness: row
            .get::<Option<i16>, _>("profile_completeness")
            .and_then(|value| u8::try_from(value).ok()),
        gpa: row.get("gpa"),
        english_score: row.get("english_score"),
        preferred_degree_level: row.get("preferred_degree_level"),
        field_of_study: row.get("field_of_study"),
        preferred_countries: row.get("preferred_countries"),
        budget: row.get("budget"),
    }
}

fn inquiry_from_row(row: &PgRow) -> Inquiry {
    Inquiry {
        id: row.get("id"),
        assigned_to: row.get("assigned_to"),
        status: status::<InquiryStatus>(row, "status"),
        created_date: row.get("created_date"),
        updated_date: row.get("updated_date"),
    }
}

fn application_from_row(row: &PgRow) -> Application {
    Application {
        id: row.get("id"),
        student_id: row.get("student_id"),
        status: status::<ApplicationStatus>(row, "status"),
        applied_date: row.get("applied_date"),
        intake: row.get("intake"),
        milestones: row.get("milestones"),
        visa_status: status::<VisaStatus>(row, "visa_status"),
    }
}

fn task_from_row(row: &PgRow) -> Task {
    Task {
        id: row.get("id"),
        assigned_to: row.get("assigned_to"),
        student_id: row.get("student_id"),
        status: status::<TaskStatus>(row, "status"),
        due_date: row.get("due_date"),
        priority: row.get("priority"),
    }
}

fn message_from_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        student_id: row.get("student_id"),
        counselor_id: row.get("counselor_id"),
        sender_id: row.get("sender_id"),
        created_date: row.get("created_date"),
        sentiment: status::<Sentiment>(row, "sentiment"),
        response_time_minutes: row
            .get::<Option<i32>, _>("response_time_minutes")
            .and_then(|minutes| u32::try_from(minutes).ok()),
    }
}

fn course_from_row(row: &PgRow) -> Course {
    Course {
        id: row.get("id"),
        name: row.get("name"),
        university: row.get("university"),
        country: row.get("country"),
        degree_level: row.get("degree_level"),
        field: row.get("field"),
        min_gpa: row.get("min_gpa"),
        min_english: row.get("min_english"),
        tuition_fee: row.get("tuition_fee"),
    }
}

fn scholarship_from_row(row: &PgRow) -> Scholarship {
    Scholarship {
        id: row.get("id"),
        name: row.get("name"),
        country: row.get("country"),
        degree_level: row.get("degree_level"),
        fields: row.get("fields"),
        min_gpa: row.get("min_gpa"),
        min_english: row.get("min_english"),
        amount: row.get("amount"),
    }
}

const DEMO_ID_BASE: u128 = 0x3d7f5d6f_24f7_4e8e_8b4b_000000000000;

fn demo_id(kind: u16, index: usize) -> String {
    Uuid::from_u128(DEMO_ID_BASE | (u128::from(kind) << 16) | index as u128).to_string()
}

/// A small but realistic team used by `seed`, dated relative to `now`.
/// Ids are fixed so reseeding hits the `ON CONFLICT` guard.
pub fn demo_dataset(now: NaiveDateTime) -> Dataset {
    let days_ago = |days: i64| now - Duration::days(days);
    let hours_ago = |hours: i64| now - Duration::hours(hours);

    let counselors = vec![
        Counselor {
            id: "counselor-priya".to_string(),
            name: "Priya Shah".to_string(),
            specializations: vec!["UK".to_string(), "Ireland".to_string()],
        },
        Counselor {
            id: "counselor-marcus".to_string(),
            name: "Marcus Bell".to_string(),
            specializations: vec!["Canada".to_string()],
        },
        Counselor {
            id: "counselor-lena".to_string(),
            name: "Lena Okafor".to_string(),
            specializations: vec!["Australia".to_string(), "New Zealand".to_string()],
        },
    ];

    let students = vec![
        ("Avery Lee", "counselor-priya", StudentStatus::Enrolled, 3.6, "Computer Science"),
        ("Jules Moreno", "counselor-priya", StudentStatus::Applied, 3.1, "Business"),
        ("Kiara Patel", "counselor-priya", StudentStatus::Converted, 3.8, "Data Science"),
        ("Noah Kim", "counselor-marcus", StudentStatus::Active, 2.9, "Nursing"),
        ("Sana Iqbal", "counselor-marcus", StudentStatus::Lead, 3.3, "Engineering"),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (name, counselor, status, gpa, field))| StudentProfile {
        id: demo_id(1, index),
        full_name: Some(name.to_string()),
        counselor_id: Some(counselor.to_string()),
        status,
        created_date: Some(days_ago(120 - index as i64 * 10)),
        profile_completeness: Some(60 + index as u8 * 8),
        gpa: Some(gpa),
        english_score: Some(6.5),
        preferred_degree_level: Some("Masters".to_string()),
        field_of_study: Some(field.to_string()),
        preferred_countries: vec!["UK".to_string(), "Canada".to_string()],
        budget: Some(22_000.0),
    })
    .collect::<Vec<_>>();

    let applications = [
        (0, ApplicationStatus::Enrolled, VisaStatus::Approved, 40),
        (1, ApplicationStatus::ConditionalOffer, VisaStatus::NotStarted, 12),
        (1, ApplicationStatus::Rejected, VisaStatus::NotStarted, 20),
        (2, ApplicationStatus::UnconditionalOffer, VisaStatus::Applied, 9),
        (3, ApplicationStatus::Submitted, VisaStatus::NotStarted, 5),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (student, status, visa_status, applied))| Application {
        id: demo_id(2, index),
        student_id: Some(students[student].id.clone()),
        status,
        applied_date: Some(days_ago(applied)),
        intake: Some("September 2026".to_string()),
        milestones: vec!["documents_collected".to_string()],
        visa_status,
    })
    .collect();

    let inquiries = [
        ("counselor-priya", InquiryStatus::Converted, 3),
        ("counselor-priya", InquiryStatus::Contacted, 8),
        ("counselor-marcus", InquiryStatus::New, 1),
        ("counselor-lena", InquiryStatus::Lost, 15),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (assigned_to, status, created))| Inquiry {
        id: demo_id(3, index),
        assigned_to: Some(assigned_to.to_string()),
        status,
        created_date: Some(days_ago(created)),
        updated_date: Some(days_ago(created) + Duration::hours(6)),
    })
    .collect();

    let tasks = [
        ("counselor-priya", TaskStatus::Completed, 2),
        ("counselor-priya", TaskStatus::Pending, -3),
        ("counselor-marcus", TaskStatus::InProgress, 1),
        ("counselor-marcus", TaskStatus::Completed, 4),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (assigned_to, status, due))| Task {
        id: demo_id(4, index),
        assigned_to: Some(assigned_to.to_string()),
        student_id: None,
        status,
        due_date: Some(days_ago(due)),
        priority: Some("medium".to_string()),
    })
    .collect();

    let conversation =
        |index: usize, student: &StudentProfile, counselor: &str, sender: &str, sent: i64| {
            Message {
                id: demo_id(5, index),
                student_id: Some(student.id.clone()),
                counselor_id: Some(counselor.to_string()),
                sender_id: Some(sender.to_string()),
                created_date: Some(hours_ago(sent)),
                sentiment: Sentiment::Neutral,
                response_time_minutes: None,
            }
        };
    let messages = vec![
        conversation(0, &students[0], "counselor-priya", &students[0].id, 30),
        conversation(1, &students[0], "counselor-priya", "counselor-priya", 28),
        conversation(2, &students[1], "counselor-priya", &students[1].id, 10),
        conversation(3, &students[1], "counselor-priya", "counselor-priya", 9),
        conversation(4, &students[3], "counselor-marcus", &students[3].id, 50),
        conversation(5, &students[3], "counselor-marcus", "counselor-marcus", 44),
    ];

    let courses = vec![
        Course {
            id: "course-leeds-msc-cs".to_string(),
            name: "MSc Advanced Computer Science".to_string(),
            university: Some("University of Leeds".to_string()),
            country: Some("UK".to_string()),
            degree_level: Some("Masters".to_string()),
            field: Some("Computer Science".to_string()),
            min_gpa: Some(3.0),
            min_english: Some(6.5),
            tuition_fee: Some(21_000.0),
        },
        Course {
            id: "course-toronto-mba".to_string(),
            name: "MBA".to_string(),
            university: Some("University of Toronto".to_string()),
            country: Some("Canada".to_string()),
            degree_level: Some("Masters".to_string()),
            field: Some("Business".to_string()),
            min_gpa: Some(3.3),
            min_english: Some(7.0),
            tuition_fee: Some(45_000.0),
        },
    ];

    let scholarships = vec![Scholarship {
        id: "scholarship-global-talent".to_string(),
        name: "Global Talent Award".to_string(),
        country: Some("UK".to_string()),
        degree_level: Some("Masters".to_string()),
        fields: vec!["Computer Science".to_string(), "Data Science".to_string()],
        min_gpa: Some(3.5),
        min_english: Some(6.5),
        amount: Some(5_000.0),
    }];

    Dataset {
        counselors,
        students,
        inquiries,
        applications,
        tasks,
        messages,
        courses,
        scholarships,
    }
}
