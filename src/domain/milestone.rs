use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A checkpoint against an Item: a target date, a free-labeled status,
/// and an aggregated summary rolled up from its
/// [`MilestoneContextObject`]s (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Milestone {
    pub id: String,
    pub item_id: String,
    pub title: String,
    pub description: String,
    pub due_date: Option<i64>,
    pub status: String,
    /// Rolled-up summary across this milestone's context objects,
    /// refreshed whenever one of them is (re)analyzed.
    pub summary: Option<String>,
    pub created_by: String,
    pub created_at: i64,
}

/// What a [`MilestoneContextObject`] was sourced from (spec §3: "kind ∈
/// {file, email, transcript, note}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneContextKind {
    File,
    Email,
    Transcript,
    Note,
}

impl MilestoneContextKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Email => "email",
            Self::Transcript => "transcript",
            Self::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "email" => Self::Email,
            "transcript" => Self::Transcript,
            "note" => Self::Note,
            _ => Self::File,
        }
    }
}

/// One candidate task an analysis pass proposed off the back of a
/// [`MilestoneContextObject`]'s raw content (spec §3: "proposed task
/// list (array of {title, description})").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedTask {
    pub title: String,
    pub description: String,
}

/// A single piece of raw material (a file's extracted text, an email
/// thread, a call transcript, a free-form note) pinned to a
/// [`Milestone`] and, once `analyzed`, carrying an AI-generated summary
/// and proposed task list derived from it (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MilestoneContextObject {
    pub id: String,
    pub milestone_id: String,
    pub kind: String,
    pub title: String,
    pub raw_content: String,
    pub summary: Option<String>,
    /// JSON-encoded `Vec<ProposedTask>`; sqlite has no native array
    /// column, so this is serialized the same way `Settings` rows are.
    pub proposed_tasks_json: String,
    pub analyzed: bool,
    pub created_at: i64,
}

impl MilestoneContextObject {
    pub fn kind(&self) -> MilestoneContextKind {
        MilestoneContextKind::parse(&self.kind)
    }

    pub fn proposed_tasks(&self) -> Vec<ProposedTask> {
        serde_json::from_str(&self.proposed_tasks_json).unwrap_or_default()
    }
}
