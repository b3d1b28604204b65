use sqlx::SqlitePool;

use crate::domain::{QaSource, QaSourceRef, QuestionAnswer};
use crate::error::{IdeaGraphError, Result};

pub async fn get(pool: &SqlitePool, id: &str) -> Result<QuestionAnswer> {
    sqlx::query_as::<_, QuestionAnswer>("SELECT * FROM question_answers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("question_answer {id}")))
}

#[allow(clippy::too_many_arguments)]
pub async fn record(
    pool: &SqlitePool,
    question: &str,
    answer: &str,
    item_id: Option<&str>,
    asked_by: Option<&str>,
    source: QaSource,
    sources: &[QaSourceRef],
) -> Result<QuestionAnswer> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();
    let sources_json = serde_json::to_string(sources).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        INSERT INTO question_answers (id, question, answer, item_id, asked_by, source, sources_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(question)
    .bind(answer)
    .bind(item_id)
    .bind(asked_by)
    .bind(source.as_str())
    .bind(sources_json)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

/// Promotes a previously-recorded Q&A pair into reusable knowledge
/// (spec §3 "saved-as-knowledge flag"); the caller still owns upserting
/// the corresponding `QA`-typed `KnowledgeObject`.
pub async fn mark_saved_as_knowledge(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("UPDATE question_answers SET saved_as_knowledge = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(IdeaGraphError::NotFound(format!("question_answer {id}")));
    }
    Ok(())
}

pub async fn list_for_item(pool: &SqlitePool, item_id: &str, limit: i64) -> Result<Vec<QuestionAnswer>> {
    Ok(sqlx::query_as::<_, QuestionAnswer>(
        "SELECT * FROM question_answers WHERE item_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(item_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}
