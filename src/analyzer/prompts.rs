//! Per-category analysis prompts.

use crate::task::EvidenceCategory;

/// Writing rules appended to every prompt sent to the model.
pub const CONSTRAINTS: &[&str] = &[
    "Do NOT use the word 'verify' in test cases",
    "Use 'check', 'validate', or 'confirm' instead of 'verify'",
    "Be specific and actionable in all descriptions",
];

pub fn constraints_block() -> String {
    let mut block = String::from("IMPORTANT CONSTRAINTS:");
    for rule in CONSTRAINTS {
        block.push_str("\n- ");
        block.push_str(rule);
    }
    block
}

const VIDEO_PROMPT: &str = r#"You are analyzing a screen recording that shows a bug or a feature.
Follow the events in order, identify what is being demonstrated, extract steps to reproduce, and note any error messages or visual defects.

Reply with a single JSON object:
{
  "task_name": "Brief, descriptive title",
  "summary": "What the recording shows",
  "steps_to_reproduce": ["Step 1", "Step 2"],
  "expected_behavior": "What should happen",
  "actual_behavior": "What actually happens",
  "severity": "Critical|High|Medium|Low",
  "additional_notes": "Other observations"
}"#;

const PDF_PROMPT: &str = r#"You are analyzing a PDF containing requirements, specifications, or documentation.
Extract functional requirements, constraints, and acceptance criteria. Point out ambiguities or missing information.

Reply with a single JSON object:
{
  "task_name": "Brief title based on the document",
  "summary": "High-level summary",
  "functional_requirements": ["Requirement 1"],
  "constraints": ["Constraint 1"],
  "acceptance_criteria": ["Criterion 1"],
  "priority": "Critical|High|Medium|Low",
  "additional_notes": "Missing info or ambiguities"
}"#;

const SPREADSHEET_PROMPT: &str = r#"You are analyzing a spreadsheet (CSV or Excel) holding data, tasks, or test cases.
Summarize its structure, pick out high-priority items (Priority, Status, or Severity columns), and note patterns and data quality issues.

Reply with a single JSON object:
{
  "task_name": "Brief title based on the spreadsheet",
  "summary": "What the spreadsheet contains",
  "total_rows": "Number of data rows",
  "high_priority_items": ["Item 1"],
  "key_insights": ["Insight 1"],
  "data_quality_issues": ["Issue 1"],
  "additional_notes": "Recommendations"
}"#;

const IMAGE_PROMPT: &str = r#"You are analyzing a screenshot or image that may show UI issues, visual defects, or important information.
Read any visible text, identify layout or styling defects, and note error messages or alerts.

Reply with a single JSON object:
{
  "task_name": "Brief title based on the image",
  "summary": "What the image shows",
  "extracted_text": "Text found in the image",
  "visual_defects": ["Defect 1"],
  "ui_elements": ["Element 1"],
  "severity": "Critical|High|Medium|Low",
  "additional_notes": "Context or recommendations"
}"#;

/// Full analysis prompt for a category, with optional user notes.
pub fn analysis_prompt(category: EvidenceCategory, notes: Option<&str>) -> String {
    let base = match category {
        EvidenceCategory::Video => VIDEO_PROMPT,
        EvidenceCategory::Pdf => PDF_PROMPT,
        EvidenceCategory::Spreadsheet => SPREADSHEET_PROMPT,
        EvidenceCategory::Image => IMAGE_PROMPT,
    };

    let mut prompt = format!("{}\n\n{}", base, constraints_block());
    if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
        prompt.push_str("\n\nUser Context Notes:\n");
        prompt.push_str(notes);
        prompt.push_str("\n\nNow analyze the file.");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_includes_constraints_and_notes() {
        let prompt = analysis_prompt(EvidenceCategory::Image, Some("  checkout page  "));
        assert!(prompt.contains("screenshot"));
        assert!(prompt.contains("IMPORTANT CONSTRAINTS:\n- Do NOT use the word 'verify'"));
        assert!(prompt.ends_with("User Context Notes:\ncheckout page\n\nNow analyze the file."));
    }

    #[test]
    fn test_blank_notes_are_ignored() {
        let prompt = analysis_prompt(EvidenceCategory::Pdf, Some("   "));
        assert!(!prompt.contains("User Context Notes"));
        assert!(prompt.contains("acceptance_criteria"));
    }
}
