//! The five-stage review workflow.
//!
//! Transitions are unrestricted: any state may be set from any state,
//! including `Done`. A move is only classified so it can be logged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review status of a task, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "In Review", alias = "InReview")]
    InReview,
    #[serde(rename = "Passed In Review", alias = "PassedInReview")]
    PassedInReview,
    #[serde(rename = "In Stage", alias = "InStage")]
    InStage,
    #[serde(rename = "Passed In Stage", alias = "PassedInStage")]
    PassedInStage,
    #[serde(rename = "Done")]
    Done,
}

/// A status string outside the five recognised values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid status '{}' (expected one of: {})",
            self.0,
            TaskStatus::ALL
                .iter()
                .map(|s| s.label())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for InvalidStatus {}

impl TaskStatus {
    /// Every status in workflow order.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::InReview,
        TaskStatus::PassedInReview,
        TaskStatus::InStage,
        TaskStatus::PassedInStage,
        TaskStatus::Done,
    ];

    /// Status assigned to every newly created task.
    pub const INITIAL: TaskStatus = TaskStatus::InReview;

    /// The literal stored in the tabular store.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InReview => "In Review",
            Self::PassedInReview => "Passed In Review",
            Self::InStage => "In Stage",
            Self::PassedInStage => "Passed In Stage",
            Self::Done => "Done",
        }
    }

    /// Variant name, also accepted on input.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InReview => "InReview",
            Self::PassedInReview => "PassedInReview",
            Self::InStage => "InStage",
            Self::PassedInStage => "PassedInStage",
            Self::Done => "Done",
        }
    }

    /// Zero-based position in the workflow.
    pub fn position(&self) -> usize {
        match self {
            Self::InReview => 0,
            Self::PassedInReview => 1,
            Self::InStage => 2,
            Self::PassedInStage => 3,
            Self::Done => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Only `Done` tasks feed the output generator by default.
    pub fn is_output_eligible(&self) -> bool {
        self.is_terminal()
    }

    /// Classify a move from `self` to `target`. Every move is allowed.
    pub fn transition_to(self, target: TaskStatus) -> Transition {
        let direction = match target.position().cmp(&self.position()) {
            std::cmp::Ordering::Greater => TransitionDirection::Forward,
            std::cmp::Ordering::Less => TransitionDirection::Backward,
            std::cmp::Ordering::Equal => TransitionDirection::Unchanged,
        };
        Transition {
            from: self,
            to: target,
            direction,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = InvalidStatus;

    /// Accepts the stored label ("In Stage") or the variant name ("InStage").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.label() == s || status.name() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

/// Direction of a status change relative to workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDirection {
    Forward,
    Backward,
    Unchanged,
}

/// A classified status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub direction: TransitionDirection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels_and_names() {
        for status in TaskStatus::ALL {
            assert_eq!(status.label().parse::<TaskStatus>().unwrap(), status);
            assert_eq!(status.name().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for raw in ["", "done ", "in review", "Archived", "IN_STAGE"] {
            let err = raw.parse::<TaskStatus>().unwrap_err();
            assert_eq!(err.0, raw);
        }
    }

    #[test]
    fn test_workflow_order() {
        let positions: Vec<usize> = TaskStatus::ALL.iter().map(|s| s.position()).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
        assert_eq!(TaskStatus::INITIAL, TaskStatus::InReview);
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::PassedInStage.is_terminal());
    }

    #[test]
    fn test_any_to_any_is_classified() {
        let t = TaskStatus::Done.transition_to(TaskStatus::InStage);
        assert_eq!(t.direction, TransitionDirection::Backward);

        let t = TaskStatus::InReview.transition_to(TaskStatus::Done);
        assert_eq!(t.direction, TransitionDirection::Forward);

        let t = TaskStatus::InStage.transition_to(TaskStatus::InStage);
        assert_eq!(t.direction, TransitionDirection::Unchanged);
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&TaskStatus::PassedInStage).unwrap();
        assert_eq!(json, "\"Passed In Stage\"");

        let parsed: TaskStatus = serde_json::from_str("\"InStage\"").unwrap();
        assert_eq!(parsed, TaskStatus::InStage);
    }
}
