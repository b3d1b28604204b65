//! Maintains the single logical `KnowledgeObject` collection in sync with
//! the domain entities (spec §4.4). Every operation is idempotent and
//! failures are caught, logged, and never roll back the primary write
//! (spec §4.4 "Failure policy").

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::warn;

use super::{KnowledgeObject, KnowledgeObjectType, SearchFilter, SearchHit, VectorIndexClient};
use crate::db::{items, tags};
use crate::domain::{Item, ItemFile, QuestionAnswer, Task};
use crate::error::Result;

pub struct KnowledgeSync {
    client: Arc<dyn VectorIndexClient>,
}

impl KnowledgeSync {
    pub fn new(client: Arc<dyn VectorIndexClient>) -> Self {
        Self { client }
    }

    /// Upserts are best-effort: a vector-index error is logged and
    /// swallowed so the caller's primary DB write still "succeeds" (spec
    /// §4.4, §3 "Lifecycle summary").
    async fn upsert_best_effort(&self, object: KnowledgeObject) {
        let id = object.id.clone();
        let ok = self.client.upsert(object).await;
        crate::metrics::track_knowledge_sync("upsert", ok.is_ok()).await;
        if let Err(e) = ok {
            warn!(knowledge_object_id = %id, error = %e, "knowledge sync upsert failed");
        }
    }

    async fn delete_best_effort(&self, id: &str) {
        let ok = self.client.delete(id).await;
        crate::metrics::track_knowledge_sync("delete", ok.is_ok()).await;
        if let Err(e) = ok {
            warn!(knowledge_object_id = %id, error = %e, "knowledge sync delete failed");
        }
    }

    pub async fn upsert_item(&self, pool: &SqlitePool, item: &Item) -> Result<()> {
        let description = items::effective_context(pool, &item.id).await?;
        let tag_names = tags::for_item(pool, &item.id)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();

        self.upsert_best_effort(KnowledgeObject {
            id: item.id.clone(),
            kind: KnowledgeObjectType::Item,
            title: item.title.clone(),
            description,
            status: item.status.clone(),
            owner: item.owner_id.clone(),
            item_id: item.parent_id.clone(),
            task_id: None,
            tags: tag_names,
            url: format!("/items/{}", item.id),
            github_issue_id: None,
            created_at: item.created_at,
        })
        .await;
        Ok(())
    }

    pub async fn delete_item(&self, item_id: &str) {
        self.delete_best_effort(item_id).await;
    }

    pub async fn upsert_task(&self, pool: &SqlitePool, task: &Task) -> Result<()> {
        let tag_names = tags::for_task(pool, &task.id)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();

        self.upsert_best_effort(KnowledgeObject {
            id: task.id.clone(),
            kind: KnowledgeObjectType::Task,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.clone(),
            owner: task.requester_id.clone(),
            item_id: Some(task.item_id.clone()),
            task_id: Some(task.id.clone()),
            tags: tag_names,
            url: format!("/tasks/{}", task.id),
            github_issue_id: task.github_issue_number,
            created_at: task.created_at,
        })
        .await;
        Ok(())
    }

    pub async fn delete_task(&self, task_id: &str) {
        self.delete_best_effort(task_id).await;
    }

    /// A Task with a linked GitHub issue gets a single `GitHubIssue`
    /// KnowledgeObject (spec §3: "no separate GitHubIssues collection").
    /// Its id is the task id suffixed so it never collides with the
    /// Task's own KO record.
    pub async fn upsert_github_issue(
        &self,
        task: &Task,
        issue_title: &str,
        issue_body: &str,
        issue_state: &str,
    ) -> Result<()> {
        self.upsert_best_effort(KnowledgeObject {
            id: format!("{}_issue", task.id),
            kind: KnowledgeObjectType::GitHubIssue,
            title: issue_title.to_string(),
            description: issue_body.to_string(),
            status: issue_state.to_string(),
            owner: String::new(),
            item_id: Some(task.item_id.clone()),
            task_id: Some(task.id.clone()),
            tags: Vec::new(),
            url: String::new(),
            github_issue_id: task.github_issue_number,
            created_at: task.created_at,
        })
        .await;
        Ok(())
    }

    /// Fans a File out into `<fileId>_<n>` chunk KnowledgeObjects (spec
    /// §9 "File-chunk identifiers"). `old_chunk_count` lets a reindex
    /// drop trailing indices left behind by a shrinking edit.
    pub async fn upsert_file_chunks(
        &self,
        file: &ItemFile,
        chunk_titles_and_bodies: &[(String, String)],
        old_chunk_count: i64,
    ) -> Result<()> {
        for (n, (title, body)) in chunk_titles_and_bodies.iter().enumerate() {
            self.upsert_best_effort(KnowledgeObject {
                id: format!("{}_{}", file.id, n),
                kind: KnowledgeObjectType::File,
                title: title.clone(),
                description: body.clone(),
                status: String::new(),
                owner: file.uploaded_by.clone(),
                item_id: Some(file.item_id.clone()),
                task_id: None,
                tags: Vec::new(),
                url: file.web_url.clone(),
                github_issue_id: None,
                created_at: file.created_at,
            })
            .await;
        }

        let new_count = chunk_titles_and_bodies.len() as i64;
        for n in new_count..old_chunk_count {
            self.delete_best_effort(&format!("{}_{}", file.id, n)).await;
        }
        Ok(())
    }

    /// Deletes a File's KO chunks, given the chunk count it had at
    /// delete time (spec §3: "Deleting an ItemFile removes ... all
    /// derived knowledge chunks").
    pub async fn delete_file(&self, file_id: &str, chunk_count: i64) {
        for n in 0..chunk_count {
            self.delete_best_effort(&format!("{}_{}", file_id, n)).await;
        }
    }

    pub async fn upsert_question_answer(&self, qa: &QuestionAnswer) {
        self.upsert_best_effort(KnowledgeObject {
            id: qa.id.clone(),
            kind: KnowledgeObjectType::Qa,
            title: qa.question.clone(),
            description: qa.answer.clone(),
            status: String::new(),
            owner: qa.asked_by.clone().unwrap_or_default(),
            item_id: qa.item_id.clone(),
            task_id: None,
            tags: Vec::new(),
            url: String::new(),
            github_issue_id: None,
            created_at: qa.created_at,
        })
        .await;
    }

    /// Thin pass-through to the vector index's hybrid search (spec §4.4
    /// `search`).
    pub async fn search(
        &self,
        query: &str,
        alpha: f32,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        self.client.search(query, alpha, limit, filter).await
    }
}
