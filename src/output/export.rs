//! Plain CSV export of tasks, no model involved.

use crate::store::{encode_row, SHEET_HEADERS};
use crate::task::Task;

/// Quote a CSV field when it contains a delimiter, quote or line break.
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

/// Tasks as CSV with the same columns as the task sheet, in input order.
pub fn export_tasks_csv(tasks: &[Task]) -> String {
    let mut out = csv_line(&SHEET_HEADERS);
    for task in tasks {
        out.push_str(&csv_line(&encode_row(task)));
    }
    out
}
