use sqlx::SqlitePool;

use crate::domain::{CommentDirection, CommentSource, TaskComment};
use crate::error::Result;

/// Appends a comment to a Task. Linearizable per task: sqlite serializes
/// writers against the same row, and ordering on read is by
/// `(created_at, id)`, matching the "insert after max(position)" idiom
/// for a store without a dedicated sequence column (spec §5).
#[allow(clippy::too_many_arguments)]
pub async fn append(
    pool: &SqlitePool,
    task_id: &str,
    author_id: Option<&str>,
    body: &str,
    source: CommentSource,
    direction: CommentDirection,
    source_message_id: Option<&str>,
) -> Result<TaskComment> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO task_comments (id, task_id, author_id, body, source, direction, source_message_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(task_id)
    .bind(author_id)
    .bind(body)
    .bind(source.as_str())
    .bind(direction.as_str())
    .bind(source_message_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(TaskComment {
        id,
        task_id: task_id.to_string(),
        author_id: author_id.map(str::to_string),
        body: body.to_string(),
        source: source.as_str().to_string(),
        direction: direction.as_str().to_string(),
        source_message_id: source_message_id.map(str::to_string),
        created_at: now,
    })
}

pub async fn list_for_task(pool: &SqlitePool, task_id: &str) -> Result<Vec<TaskComment>> {
    Ok(sqlx::query_as::<_, TaskComment>(
        "SELECT * FROM task_comments WHERE task_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?)
}
