use sqlx::SqlitePool;

use crate::domain::{normalize_tag_name, Tag};
use crate::error::{IdeaGraphError, Result};

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Tag> {
    sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("tag {id}")))
}

pub async fn find_by_name(pool: &SqlitePool, raw_name: &str) -> Result<Option<Tag>> {
    let name = normalize_tag_name(raw_name);
    Ok(sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Tag>> {
    Ok(
        sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY usage_count DESC, name ASC")
            .fetch_all(pool)
            .await?,
    )
}

/// Creates the tag if absent; returns the existing row unchanged
/// otherwise. Normalization means two different-looking inputs that
/// fold to the same string are the same Tag (spec §3).
pub async fn get_or_create(pool: &SqlitePool, raw_name: &str, description: Option<&str>) -> Result<Tag> {
    let name = normalize_tag_name(raw_name);
    if name.is_empty() {
        return Err(IdeaGraphError::InvalidInput("tag name is empty after normalization".into()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO tags (id, name, description, usage_count, created_at)
        VALUES (?, ?, ?, 0, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(&name)
    .bind(description)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_name(pool, &name)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("tag {name} not found after insert")))
}

/// Recomputes `usage_count` from the join tables. Backs the `sync-tags`
/// CLI command; usage_count is never trusted as authoritative on its
/// own (spec §3).
pub async fn recompute_usage_count(pool: &SqlitePool, tag_id: &str) -> Result<i64> {
    let (item_uses,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM item_tags WHERE tag_id = ?")
        .bind(tag_id)
        .fetch_one(pool)
        .await?;
    let (task_uses,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_tags WHERE tag_id = ?")
        .bind(tag_id)
        .fetch_one(pool)
        .await?;
    let total = item_uses + task_uses;

    sqlx::query("UPDATE tags SET usage_count = ? WHERE id = ?")
        .bind(total)
        .bind(tag_id)
        .execute(pool)
        .await?;

    Ok(total)
}

/// Deletes every tag whose recomputed usage count is zero. Backs the
/// `cleanup-tags` CLI command.
pub async fn delete_unused(pool: &SqlitePool, dry_run: bool) -> Result<Vec<Tag>> {
    let all = list(pool).await?;
    let mut removed = Vec::new();

    for tag in all {
        let count = recompute_usage_count(pool, &tag.id).await?;
        if count == 0 {
            if !dry_run {
                sqlx::query("DELETE FROM tags WHERE id = ?")
                    .bind(&tag.id)
                    .execute(pool)
                    .await?;
            }
            removed.push(tag);
        }
    }

    Ok(removed)
}

pub async fn attach_to_item(pool: &SqlitePool, item_id: &str, tag_id: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO item_tags (item_id, tag_id) VALUES (?, ?)")
        .bind(item_id)
        .bind(tag_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn attach_to_task(pool: &SqlitePool, task_id: &str, tag_id: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
        .bind(task_id)
        .bind(tag_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn for_item(pool: &SqlitePool, item_id: &str) -> Result<Vec<Tag>> {
    Ok(sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.* FROM tags t
        INNER JOIN item_tags it ON it.tag_id = t.id
        WHERE it.item_id = ?
        ORDER BY t.name ASC
        "#,
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?)
}

pub async fn for_task(pool: &SqlitePool, task_id: &str) -> Result<Vec<Tag>> {
    Ok(sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.* FROM tags t
        INNER JOIN task_tags tt ON tt.tag_id = t.id
        WHERE tt.task_id = ?
        ORDER BY t.name ASC
        "#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?)
}
