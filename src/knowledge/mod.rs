//! The single logical search collection, `KnowledgeObject` (spec §3), and
//! the sync/search surface the rest of the pipeline drives it through.

mod cloud;
pub mod embedding;
mod local;
pub mod sync;

use serde::{Deserialize, Serialize};

pub use cloud::CloudVectorIndex;
pub use local::LocalVectorIndex;
pub use sync::KnowledgeSync;

/// `type` discriminator for a [`KnowledgeObject`] (spec §3 cross-entity
/// invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum KnowledgeObjectType {
    Item,
    Task,
    GitHubIssue,
    File,
    Context,
    #[serde(rename = "QA")]
    Qa,
}

impl KnowledgeObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Item => "Item",
            Self::Task => "Task",
            Self::GitHubIssue => "GitHubIssue",
            Self::File => "File",
            Self::Context => "Context",
            Self::Qa => "QA",
        }
    }
}

/// The canonical vector-index payload (spec §6 table). `id` always equals
/// the owning entity's id, except file chunks which use `<fileId>_<n>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeObject {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: KnowledgeObjectType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub owner: String,
    #[serde(rename = "itemId", skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(rename = "taskId", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "githubIssueId", skip_serializing_if = "Option::is_none")]
    pub github_issue_id: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// One hybrid-search result (spec §6: "the core assumes hybrid search
/// returning `{id, score, properties}`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub properties: KnowledgeObject,
}

/// A filter expression for hybrid search. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub kind: Option<KnowledgeObjectType>,
    pub item_id: Option<String>,
}

/// The minimal surface the core depends on (spec §2 "VectorIndex
/// (external)"): upsert-by-id, fetch-by-id, delete-by-id, hybrid search
/// with a filter expression, exists-check.
#[async_trait::async_trait]
pub trait VectorIndexClient: Send + Sync {
    async fn upsert(&self, object: KnowledgeObject) -> crate::error::Result<()>;
    async fn fetch(&self, id: &str) -> crate::error::Result<Option<KnowledgeObject>>;
    async fn delete(&self, id: &str) -> crate::error::Result<()>;
    async fn exists(&self, id: &str) -> crate::error::Result<bool> {
        Ok(self.fetch(id).await?.is_some())
    }
    async fn search(
        &self,
        query: &str,
        alpha: f32,
        limit: usize,
        filter: &SearchFilter,
    ) -> crate::error::Result<Vec<SearchHit>>;
}
