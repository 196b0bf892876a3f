//! Prompts for the generated deliverables.

use crate::analyzer::constraints_block;
use crate::task::Task;

use super::{ReportWindow, TaskGroup};

pub const TEST_CASE_COLUMNS: [&str; 5] = ["Test Case ID", "Title", "Steps", "Expected Result", "Priority"];

fn task_context(index: usize, task: &Task) -> String {
    let mut text = format!(
        "Task {}: {}\nType: {}\nStatus: {}\nSummary: {}\nEvidence: {}",
        index + 1,
        task.title(),
        task.evidence().category(),
        task.status(),
        task.description(),
        task.evidence().locator()
    );
    let fields = task.analysis().fields_as_text();
    if !fields.is_empty() {
        text.push_str("\nDetails:\n");
        text.push_str(&fields);
    }
    if let Some(notes) = task.notes() {
        text.push_str("\nNotes: ");
        text.push_str(notes);
    }
    text
}

fn tasks_context(tasks: &[&Task]) -> String {
    tasks
        .iter()
        .enumerate()
        .map(|(i, task)| task_context(i, task))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn test_cases_prompt(tasks: &[&Task]) -> String {
    format!(
        "You are writing test cases for import into TestRail, based on completed tasks.\n\n\
         Output CSV only, with the header row: {}\n\
         - One row per test case; quote fields that contain commas or line breaks\n\
         - Steps are numbered, specific and actionable\n\
         - Expected results are specific and measurable\n\
         - Test cases are independent and repeatable\n\n\
         {}\n\nTasks:\n{}",
        TEST_CASE_COLUMNS.join(", "),
        constraints_block(),
        tasks_context(tasks)
    )
}

pub fn requirement_document_prompt(tasks: &[&Task]) -> String {
    format!(
        "You are writing a requirement document from the tasks below.\n\n\
         Use Markdown with these sections:\n\
         - Executive Summary\n\
         - Functional Requirements (grouped by feature area)\n\
         - Non-Functional Requirements\n\
         - Constraints and Assumptions\n\
         - Evidence References (link every evidence URL)\n\n\
         {}\n\nTasks:\n{}",
        constraints_block(),
        tasks_context(tasks)
    )
}

pub fn scrum_email_prompt(tasks: &[&Task], groups: &[TaskGroup], window: &ReportWindow) -> String {
    let mut listing = String::new();
    for group in groups {
        listing.push_str(&format!("\n{} ({}):\n", group.category, group.task_ids.len()));
        for id in &group.task_ids {
            if let Some(task) = tasks.iter().find(|t| t.id() == *id) {
                listing.push_str(&format!("- {}: {}\n", task.title(), task.description()));
            }
        }
    }

    format!(
        "You are drafting a short end-of-week Scrum update email.\n\n\
         Start with a subject line: [Weekly Scrum Update] Week of {start} to {end}\n\
         Then a brief intro, the completed work grouped by category, the number of tasks completed, \
         and a professional sign-off. Keep it easy to scan.\n\n\
         {constraints}\n\n\
         Week: {start} to {end}\n\
         Completed Tasks ({count}):{listing}",
        start = window.start(),
        end = window.end(),
        constraints = constraints_block(),
        count = tasks.len(),
        listing = listing
    )
}
