//! Mapping between [`Task`] and spreadsheet rows.

use chrono::{DateTime, Utc};

use crate::task::{
    AnalysisResult, EvidenceCategory, EvidenceReference, Task, TaskError, TaskId, TaskStatus,
};

/// Header row written to row 1 of the worksheet.
pub const SHEET_HEADERS: [&str; 13] = [
    "Task ID",
    "Task Name",
    "Summary",
    "Status",
    "File Type",
    "Evidence Link",
    "Evidence File",
    "Evidence Size",
    "Uploaded At",
    "Context Notes",
    "AI Analysis",
    "Created At",
    "Updated At",
];

pub(crate) const COL_ID: usize = 0;
pub(crate) const COL_STATUS: usize = 3;
pub(crate) const COL_UPDATED_AT: usize = 12;

/// Spreadsheet column letter for a zero-based index (A..Z only).
pub(crate) fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// Serialize a task into one row of cell values.
pub fn encode_row(task: &Task) -> Vec<String> {
    let evidence = task.evidence();
    vec![
        task.id().to_string(),
        task.title().to_string(),
        task.description().to_string(),
        task.status().label().to_string(),
        evidence.category().as_str().to_string(),
        evidence.locator().to_string(),
        evidence.filename().to_string(),
        evidence.size_bytes().to_string(),
        evidence.uploaded_at().to_rfc3339(),
        task.notes().unwrap_or_default().to_string(),
        serde_json::to_string(task.analysis()).unwrap_or_default(),
        task.created_at().to_rfc3339(),
        task.updated_at().to_rfc3339(),
    ]
}

/// Parse one row of cell values. `row` is the 1-based sheet row, used in
/// error messages. Short rows are padded with empty cells.
pub fn decode_row(row: usize, cells: &[String]) -> Result<Task, TaskError> {
    let cell = |index: usize| cells.get(index).map(|s| s.trim()).unwrap_or("");
    let malformed = |reason: String| TaskError::MalformedRow { row, reason };

    let id: TaskId = cell(COL_ID)
        .parse()
        .map_err(|e| malformed(format!("bad task id '{}': {}", cell(COL_ID), e)))?;
    let status: TaskStatus = cell(COL_STATUS)
        .parse()
        .map_err(|e| malformed(format!("{}", e)))?;
    let category: EvidenceCategory = cell(4).parse().map_err(malformed)?;
    let size_bytes = if cell(7).is_empty() {
        0
    } else {
        cell(7)
            .parse::<u64>()
            .map_err(|e| malformed(format!("bad evidence size '{}': {}", cell(7), e)))?
    };

    let timestamp = |index: usize| -> Result<DateTime<Utc>, TaskError> {
        DateTime::parse_from_rfc3339(cell(index))
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                malformed(format!(
                    "bad timestamp in column '{}': {}",
                    SHEET_HEADERS[index], e
                ))
            })
    };
    let uploaded_at = timestamp(8)?;
    let created_at = timestamp(11)?;
    let updated_at = timestamp(COL_UPDATED_AT)?;

    let title = cell(1).to_string();
    let description = cell(2).to_string();
    let analysis = if cell(10).is_empty() {
        AnalysisResult {
            title: title.clone(),
            summary: description.clone(),
            fields: Default::default(),
            raw: false,
        }
    } else {
        serde_json::from_str(cell(10))
            .map_err(|e| malformed(format!("bad analysis JSON: {}", e)))?
    };

    let notes = Some(cell(9).to_string()).filter(|n| !n.is_empty());
    let evidence = EvidenceReference::new(cell(5), cell(6), category, size_bytes, uploaded_at);

    Ok(Task::restore(
        id,
        title,
        description,
        status,
        evidence,
        analysis,
        notes,
        created_at,
        updated_at,
    ))
}
