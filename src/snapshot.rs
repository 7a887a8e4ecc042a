use std::path::Path;

use anyhow::Context;

use crate::models::Dataset;

pub fn load(path: &Path) -> anyhow::Result<Dataset> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let dataset: Dataset = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        counselors = dataset.counselors.len(),
        students = dataset.students.len(),
        inquiries = dataset.inquiries.len(),
        applications = dataset.applications.len(),
        tasks = dataset.tasks.len(),
        messages = dataset.messages.len(),
        "loaded snapshot"
    );

    Ok(dataset)
}
