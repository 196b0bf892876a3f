//! Deliverables generated from tasks: test cases, requirement documents and
//! Scrum emails.
//!
//! Each generation is a single model call at temperature 0. The generator
//! holds no state; callers pick which tasks go in.

mod export;
mod prompts;

pub use export::{csv_escape, export_tasks_csv};
pub use prompts::TEST_CASE_COLUMNS;

use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::llm::{ChatMessage, ChatOptions, Role, SharedLlmClient};
use crate::task::{strip_code_fence, EvidenceCategory, Task, TaskId};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no tasks to generate from")]
    EmptyInput,

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("report window starts after it ends ({start} > {end})")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TestCases,
    RequirementDocument,
    ScrumEmail,
}

impl ArtifactKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::TestCases => "text/csv",
            Self::RequirementDocument => "text/markdown",
            Self::ScrumEmail => "text/plain",
        }
    }

    fn filename(&self, at: DateTime<Utc>) -> String {
        match self {
            Self::TestCases => format!("test_cases_{}.csv", at.format("%Y%m%d_%H%M%S")),
            Self::RequirementDocument => format!("requirements_{}.md", at.format("%Y%m%d")),
            Self::ScrumEmail => format!("scrum_email_{}.txt", at.format("%Y%m%d")),
        }
    }
}

/// Tasks of one evidence category covered by an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskGroup {
    pub category: EvidenceCategory,
    pub task_ids: Vec<TaskId>,
}

/// A generated document plus the tasks it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub filename: String,
    pub content_type: &'static str,
    pub content: String,
    pub groups: Vec<TaskGroup>,
    pub generated_at: DateTime<Utc>,
}

/// Inclusive date range for the weekly email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, OutputError> {
        if start > end {
            return Err(OutputError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Monday of `today`'s week through `today`.
    pub fn current_week(today: NaiveDate) -> Self {
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        Self {
            start: monday,
            end: today,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.start <= day && day <= self.end
    }
}

/// Collapse duplicate ids (first occurrence wins) and group by evidence
/// category. Groups follow [`EvidenceCategory::ALL`] order; empty groups are
/// omitted.
pub fn group_by_category(tasks: &[Task]) -> (Vec<&Task>, Vec<TaskGroup>) {
    let mut unique: Vec<&Task> = Vec::with_capacity(tasks.len());
    for task in tasks {
        if !unique.iter().any(|t| t.id() == task.id()) {
            unique.push(task);
        }
    }

    let groups = EvidenceCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let task_ids: Vec<TaskId> = unique
                .iter()
                .filter(|t| t.evidence().category() == category)
                .map(|t| t.id())
                .collect();
            (!task_ids.is_empty()).then_some(TaskGroup { category, task_ids })
        })
        .collect();

    (unique, groups)
}

pub struct OutputGenerator {
    llm: SharedLlmClient,
    model: String,
}

impl OutputGenerator {
    pub fn new(llm: SharedLlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// TestRail-style CSV with [`TEST_CASE_COLUMNS`].
    pub async fn test_cases(&self, tasks: &[Task]) -> Result<Artifact, OutputError> {
        let (tasks, groups) = group_input(tasks)?;
        let prompt = prompts::test_cases_prompt(&tasks);
        self.generate(ArtifactKind::TestCases, prompt, groups).await
    }

    /// Markdown requirement document.
    pub async fn requirement_document(&self, tasks: &[Task]) -> Result<Artifact, OutputError> {
        let (tasks, groups) = group_input(tasks)?;
        let prompt = prompts::requirement_document_prompt(&tasks);
        self.generate(ArtifactKind::RequirementDocument, prompt, groups)
            .await
    }

    /// Weekly update email. `window` only labels the email; callers select
    /// the tasks.
    pub async fn scrum_email(
        &self,
        tasks: &[Task],
        window: ReportWindow,
    ) -> Result<Artifact, OutputError> {
        let (tasks, groups) = group_input(tasks)?;
        let prompt = prompts::scrum_email_prompt(&tasks, &groups, &window);
        self.generate(ArtifactKind::ScrumEmail, prompt, groups).await
    }

    async fn generate(
        &self,
        kind: ArtifactKind,
        prompt: String,
        groups: Vec<TaskGroup>,
    ) -> Result<Artifact, OutputError> {
        let start = Instant::now();
        let messages = [ChatMessage::new(Role::User, prompt)];
        let response = self
            .llm
            .chat_completion_with_options(&self.model, &messages, ChatOptions::deterministic())
            .await
            .map_err(|e| {
                tracing::error!("{:?} generation failed: {}", kind, e);
                OutputError::GenerationFailed(e.to_string())
            })?;

        let reply = response.content.unwrap_or_default();
        let content = strip_code_fence(&reply);
        if content.is_empty() {
            tracing::error!("{:?} generation returned an empty payload", kind);
            return Err(OutputError::GenerationFailed(
                "model returned an empty payload".to_string(),
            ));
        }

        let generated_at = Utc::now();
        let task_count: usize = groups.iter().map(|g| g.task_ids.len()).sum();
        tracing::info!(
            "Gemini - generate {:?} from {} tasks completed in {:.2}ms",
            kind,
            task_count,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Artifact {
            kind,
            filename: kind.filename(generated_at),
            content_type: kind.content_type(),
            content: content.to_string(),
            groups,
            generated_at,
        })
    }
}

fn group_input(tasks: &[Task]) -> Result<(Vec<&Task>, Vec<TaskGroup>), OutputError> {
    if tasks.is_empty() {
        return Err(OutputError::EmptyInput);
    }
    Ok(group_by_category(tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{task, ScriptedLlm};
    use std::sync::Arc;

    fn generator(replies: Vec<Result<String, String>>) -> (Arc<ScriptedLlm>, OutputGenerator) {
        let llm = Arc::new(ScriptedLlm::new(replies));
        (llm.clone(), OutputGenerator::new(llm, "m"))
    }

    #[test]
    fn test_grouping_covers_each_task_once() {
        let a = task("A", "a.png");
        let b = task("B", "b.mp4");
        let c = task("C", "c.jpg");
        let input = vec![a.clone(), b.clone(), c.clone(), a.clone()];

        let (unique, groups) = group_by_category(&input);
        assert_eq!(unique.len(), 3);
        assert_eq!(
            groups,
            vec![
                TaskGroup {
                    category: EvidenceCategory::Video,
                    task_ids: vec![b.id()]
                },
                TaskGroup {
                    category: EvidenceCategory::Image,
                    task_ids: vec![a.id(), c.id()]
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_model_call() {
        let (llm, generator) = generator(vec![]);
        assert!(matches!(generator.test_cases(&[]).await, Err(OutputError::EmptyInput)));
        assert!(matches!(
            generator.requirement_document(&[]).await,
            Err(OutputError::EmptyInput)
        ));
        let window = ReportWindow::current_week(Utc::now().date_naive());
        assert!(matches!(
            generator.scrum_email(&[], window).await,
            Err(OutputError::EmptyInput)
        ));
        assert!(llm.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_test_cases_strip_fence_and_run_deterministic() {
        let csv = "Test Case ID,Title,Steps,Expected Result,Priority\nTC-1,Login,1. Open,Dashboard shown,High";
        let (llm, generator) = generator(vec![Ok(format!("```csv\n{}\n```", csv))]);

        let artifact = generator.test_cases(&[task("Login", "a.png")]).await.unwrap();
        assert_eq!(artifact.content, csv);
        assert_eq!(artifact.kind, ArtifactKind::TestCases);
        assert_eq!(artifact.content_type, "text/csv");
        assert!(artifact.filename.starts_with("test_cases_") && artifact.filename.ends_with(".csv"));

        let calls = llm.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].options.temperature, Some(0.0));
        let prompt = calls[0].messages[0].text_content();
        assert!(prompt.contains("Task 1: Login"));
        assert!(prompt.contains("https://drive.example/a.png"));
    }

    #[tokio::test]
    async fn test_empty_payload_is_generation_failure() {
        let (_, generator) = generator(vec![Ok("```markdown\n```".to_string())]);
        let err = generator
            .requirement_document(&[task("A", "a.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, OutputError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_model_error_is_generation_failure() {
        let (llm, generator) = generator(vec![Err("503 unavailable".to_string())]);
        let err = generator
            .requirement_document(&[task("A", "a.pdf")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503 unavailable"));
        assert_eq!(llm.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scrum_email_lists_groups_and_window() {
        let (llm, generator) = generator(vec![Ok("Subject: [Weekly Scrum Update]".to_string())]);
        let window = ReportWindow::new(
            NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        )
        .unwrap();

        let artifact = generator
            .scrum_email(&[task("Crash on save", "a.mp4"), task("Style guide", "s.pdf")], window)
            .await
            .unwrap();
        assert_eq!(artifact.groups.len(), 2);

        let prompt = llm.calls().await[0].messages[0].text_content();
        assert!(prompt.contains("Week: 2024-05-06 to 2024-05-10"));
        assert!(prompt.contains("video (1):\n- Crash on save"));
        assert!(prompt.contains("Completed Tasks (2):"));
    }

    #[test]
    fn test_current_week_starts_monday() {
        let wednesday = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        let window = ReportWindow::current_week(wednesday);
        assert_eq!(window.start(), NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(window.end(), wednesday);

        let monday = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(ReportWindow::current_week(monday).start(), monday);
    }

    #[test]
    fn test_window_contains_whole_end_day() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let window = ReportWindow::new(day, day).unwrap();
        let late = day.and_hms_opt(23, 59, 59).unwrap().and_utc();
        assert!(window.contains(late));
        assert!(!window.contains(late + Duration::seconds(1)));

        assert!(ReportWindow::new(day, day - Duration::days(1)).is_err());
    }
}
