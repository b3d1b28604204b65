use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Where a comment originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSource {
    Mail,
    Teams,
    GitHub,
    Api,
}

impl CommentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Teams => "teams",
            Self::GitHub => "github",
            Self::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "teams" => Self::Teams,
            "github" => Self::GitHub,
            "api" => Self::Api,
            _ => Self::Mail,
        }
    }
}

/// Whether a comment flowed in from the source, or was relayed out to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentDirection {
    Inbound,
    Outbound,
}

impl CommentDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "outbound" => Self::Outbound,
            _ => Self::Inbound,
        }
    }
}

/// An append-only note against a Task. Never edited or deleted once
/// written (spec §3) — inserts are linearizable per task via the
/// `task_id` + `created_at` + `id` ordering the store enforces.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskComment {
    pub id: String,
    pub task_id: String,
    pub author_id: Option<String>,
    pub body: String,
    pub source: String,
    pub direction: String,
    pub source_message_id: Option<String>,
    pub created_at: i64,
}

impl TaskComment {
    pub fn source(&self) -> CommentSource {
        CommentSource::parse(&self.source)
    }

    pub fn direction(&self) -> CommentDirection {
        CommentDirection::parse(&self.direction)
    }
}
