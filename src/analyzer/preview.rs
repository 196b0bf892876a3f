//! Text preview of CSV evidence for the model.

const HEAD_ROWS: usize = 10;
const TAIL_ROWS: usize = 5;

/// Split CSV text into records. Handles quoted fields with embedded commas,
/// doubled quotes and newlines.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records.retain(|r| r.iter().any(|f| !f.trim().is_empty()));
    records
}

/// Columns, row count, the first rows and (for longer files) the last rows.
pub fn csv_preview(text: &str) -> String {
    let records = parse_csv(text.trim_start_matches('\u{feff}'));
    let Some((header, rows)) = records.split_first() else {
        return "Spreadsheet Data:\n\n(empty file)".to_string();
    };

    let mut out = String::from("Spreadsheet Data:\n\n");
    out.push_str(&format!("Columns: {}\n", header.join(", ")));
    out.push_str(&format!("Total Rows: {}\n\n", rows.len()));

    out.push_str(&format!("First {} rows:\n", HEAD_ROWS));
    for row in rows.iter().take(HEAD_ROWS) {
        out.push_str(&row.join(" | "));
        out.push('\n');
    }

    if rows.len() > HEAD_ROWS {
        out.push_str(&format!("\nLast {} rows:\n", TAIL_ROWS));
        for row in &rows[rows.len().saturating_sub(TAIL_ROWS)..] {
            out.push_str(&row.join(" | "));
            out.push('\n');
        }
    }
    out
}
