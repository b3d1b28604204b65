use sqlx::SqlitePool;

use crate::domain::ItemFile;
use crate::error::{IdeaGraphError, Result};

pub async fn get(pool: &SqlitePool, id: &str) -> Result<ItemFile> {
    sqlx::query_as::<_, ItemFile>("SELECT * FROM item_files WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("item_file {id}")))
}

pub async fn list_for_item(pool: &SqlitePool, item_id: &str) -> Result<Vec<ItemFile>> {
    Ok(sqlx::query_as::<_, ItemFile>(
        "SELECT * FROM item_files WHERE item_id = ? ORDER BY created_at DESC",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &SqlitePool,
    item_id: &str,
    file_name: &str,
    content_type: &str,
    size_bytes: i64,
    storage_path: &str,
    web_url: &str,
    chunk_count: i64,
    uploaded_by: &str,
) -> Result<ItemFile> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO item_files (id, item_id, file_name, content_type, size_bytes, storage_path,
                                 web_url, chunk_count, uploaded_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(item_id)
    .bind(file_name)
    .bind(content_type)
    .bind(size_bytes)
    .bind(storage_path)
    .bind(web_url)
    .bind(chunk_count)
    .bind(uploaded_by)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

/// Removes the row. Callers are responsible for deleting the remote
/// file and derived KnowledgeObject chunks first — this function is the
/// DomainStore half of that cascade (spec §3: "deleting an ItemFile
/// removes the remote file and all derived knowledge chunks").
pub async fn delete(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM item_files WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(IdeaGraphError::NotFound(format!("item_file {id}")));
    }
    Ok(())
}

pub async fn set_chunk_count(pool: &SqlitePool, id: &str, chunk_count: i64) -> Result<()> {
    sqlx::query("UPDATE item_files SET chunk_count = ? WHERE id = ?")
        .bind(chunk_count)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
