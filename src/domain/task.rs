use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Task status (spec §4.2). Ordered loosely; `Done` and `Testing` are
/// terminal from the GitHub poller's point of view (it must never
/// auto-overwrite them — spec §8 "Terminal respect").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    Ready,
    Working,
    Review,
    Testing,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ready => "ready",
            Self::Working => "working",
            Self::Review => "review",
            Self::Testing => "testing",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ready" => Self::Ready,
            "working" => Self::Working,
            "review" => Self::Review,
            "testing" => Self::Testing,
            "done" => Self::Done,
            _ => Self::New,
        }
    }

    /// Terminal statuses the GitHub poller never auto-overwrites.
    pub fn is_terminal_for_github_sync(self) -> bool {
        matches!(self, Self::Done | Self::Testing)
    }
}

/// A work unit inside an Item. Invariant: a Task without an Item is
/// invalid (enforced at the `db::tasks::create` boundary, not here).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub item_id: String,
    pub requester_id: String,
    pub assigned_id: Option<String>,
    pub github_issue_number: Option<i64>,
    pub source_message_id: Option<String>,
    pub short_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::parse(&self.status)
    }

    /// Applies the GitHub-issue-closed transition (spec §4.2 table row 2).
    /// Returns `None` if no transition should happen (already terminal, or
    /// the issue isn't closed).
    pub fn github_close_transition(&self, issue_is_closed: bool) -> Option<TaskStatus> {
        if !issue_is_closed {
            return None;
        }
        if self.status().is_terminal_for_github_sync() {
            return None;
        }
        Some(TaskStatus::Testing)
    }

    /// Applies the "pushed as GitHub issue" transition (ready -> working).
    pub fn github_push_transition(&self) -> Option<TaskStatus> {
        if self.status() == TaskStatus::Ready {
            Some(TaskStatus::Working)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_status(status: &str) -> Task {
        Task {
            id: "t1".into(),
            title: "t".into(),
            description: "d".into(),
            status: status.into(),
            item_id: "i1".into(),
            requester_id: "u1".into(),
            assigned_id: None,
            github_issue_number: Some(42),
            source_message_id: None,
            short_id: "ABC123".into(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn github_close_moves_working_to_testing() {
        let t = task_with_status("working");
        assert_eq!(t.github_close_transition(true), Some(TaskStatus::Testing));
    }

    #[test]
    fn github_close_never_overwrites_terminal_statuses() {
        assert_eq!(task_with_status("done").github_close_transition(true), None);
        assert_eq!(
            task_with_status("testing").github_close_transition(true),
            None
        );
    }

    #[test]
    fn github_close_no_op_when_issue_open() {
        assert_eq!(task_with_status("working").github_close_transition(false), None);
    }
}
