use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Where a question arrived from. `internal` support-advisor questions
/// and `api`-surfaced questions both run the same [`crate::rag`]
/// pipeline; only the wrapping differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaSource {
    Api,
    Teams,
    SupportAdvisor,
}

impl QaSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Teams => "teams",
            Self::SupportAdvisor => "support_advisor",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "teams" => Self::Teams,
            "support_advisor" => Self::SupportAdvisor,
            _ => Self::Api,
        }
    }
}

/// One cited source backing a [`QuestionAnswer`] (spec §3: "sources
/// (array of {title, type, score, id})"), persisted as a JSON array in
/// `sources_json` since sqlite has no native array column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaSourceRef {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub score: f32,
}

/// A logged question/answer pair, kept for audit and for support-advisor
/// "have we answered this before" lookups.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionAnswer {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub item_id: Option<String>,
    pub asked_by: Option<String>,
    pub source: String,
    pub sources_json: String,
    /// Whether this Q&A pair has itself been promoted into a `QA`-typed
    /// `KnowledgeObject` (spec §3 "saved-as-knowledge flag") so later
    /// RAG retrieval can surface it directly instead of only as audit
    /// history.
    pub saved_as_knowledge: bool,
    pub created_at: i64,
}

impl QuestionAnswer {
    pub fn source(&self) -> QaSource {
        QaSource::parse(&self.source)
    }

    pub fn sources(&self) -> Vec<QaSourceRef> {
        serde_json::from_str(&self.sources_json).unwrap_or_default()
    }
}
