use sqlx::SqlitePool;

use crate::domain::{Task, TaskStatus};
use crate::error::{IdeaGraphError, Result};
use crate::thread_token::ThreadTokenCodec;

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Task> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("task {id}")))
}

pub async fn find_by_short_id(pool: &SqlitePool, short_id: &str) -> Result<Option<Task>> {
    Ok(
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE short_id = ? COLLATE NOCASE")
            .bind(short_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn find_by_github_issue(
    pool: &SqlitePool,
    item_id: &str,
    issue_number: i64,
) -> Result<Option<Task>> {
    Ok(sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE item_id = ? AND github_issue_number = ?",
    )
    .bind(item_id)
    .bind(issue_number)
    .fetch_optional(pool)
    .await?)
}

pub async fn list_for_item(pool: &SqlitePool, item_id: &str) -> Result<Vec<Task>> {
    Ok(sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE item_id = ? ORDER BY created_at DESC",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?)
}

async fn short_id_exists(pool: &SqlitePool, short_id: &str) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE short_id = ?")
        .bind(short_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Picks a unique short-id for `task_id`, extending from 6 to 7 to 8
/// characters on collision, per spec §4.1's tie-break rule.
async fn allocate_short_id(pool: &SqlitePool, task_id: &str) -> Result<String> {
    for len in [6usize, 7, 8] {
        let candidate = ThreadTokenCodec::short_id_for_len(task_id, len);
        if !short_id_exists(pool, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(IdeaGraphError::domain_conflict(format!(
        "exhausted short-id tie-break space for task {task_id}"
    )))
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &SqlitePool,
    title: &str,
    description: &str,
    item_id: &str,
    requester_id: &str,
    assigned_id: Option<&str>,
    github_issue_number: Option<i64>,
    source_message_id: Option<&str>,
) -> Result<Task> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();
    let short_id = allocate_short_id(pool, &id).await?;

    sqlx::query(
        r#"
        INSERT INTO tasks (id, title, description, status, item_id, requester_id, assigned_id,
                            github_issue_number, source_message_id, short_id, created_at, updated_at)
        VALUES (?, ?, ?, 'new', ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(title)
    .bind(description)
    .bind(item_id)
    .bind(requester_id)
    .bind(assigned_id)
    .bind(github_issue_number)
    .bind(source_message_id)
    .bind(&short_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

pub async fn set_status(pool: &SqlitePool, task_id: &str, status: TaskStatus) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now)
        .bind(task_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(IdeaGraphError::NotFound(format!("task {task_id}")));
    }
    Ok(())
}

/// Manual close: always allowed, regardless of current status (spec
/// §4.2: "any -> done on manual close").
pub async fn close_manually(pool: &SqlitePool, task_id: &str) -> Result<()> {
    set_status(pool, task_id, TaskStatus::Done).await
}

/// Applies the GitHub-issue-closed transition if the current status
/// isn't already terminal. Returns the resulting status whether or not
/// a write happened, so callers can decide whether to re-upsert the
/// KnowledgeObject.
pub async fn apply_github_close(pool: &SqlitePool, task_id: &str) -> Result<TaskStatus> {
    let task = get(pool, task_id).await?;
    match task.github_close_transition(true) {
        Some(next) => {
            set_status(pool, task_id, next).await?;
            Ok(next)
        }
        None => Ok(task.status()),
    }
}

pub async fn apply_github_push(pool: &SqlitePool, task_id: &str) -> Result<TaskStatus> {
    let task = get(pool, task_id).await?;
    match task.github_push_transition() {
        Some(next) => {
            set_status(pool, task_id, next).await?;
            Ok(next)
        }
        None => Ok(task.status()),
    }
}

pub async fn set_item(pool: &SqlitePool, task_id: &str, item_id: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query("UPDATE tasks SET item_id = ?, updated_at = ? WHERE id = ?")
        .bind(item_id)
        .bind(now)
        .bind(task_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(IdeaGraphError::NotFound(format!("task {task_id}")));
    }
    Ok(())
}

pub async fn link_github_issue(pool: &SqlitePool, task_id: &str, issue_number: i64) -> Result<()> {
    sqlx::query("UPDATE tasks SET github_issue_number = ? WHERE id = ?")
        .bind(issue_number)
        .bind(task_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Tasks whose `requester_id` no longer resolves to a `User` row.
async fn no_owner(pool: &SqlitePool) -> Result<Vec<Task>> {
    Ok(sqlx::query_as::<_, Task>(
        "SELECT t.* FROM tasks t LEFT JOIN users u ON u.id = t.requester_id WHERE u.id IS NULL",
    )
    .fetch_all(pool)
    .await?)
}

/// Tasks whose `item_id` no longer resolves to an `Item` row.
async fn no_item(pool: &SqlitePool) -> Result<Vec<Task>> {
    Ok(sqlx::query_as::<_, Task>(
        "SELECT t.* FROM tasks t LEFT JOIN items i ON i.id = t.item_id WHERE i.id IS NULL",
    )
    .fetch_all(pool)
    .await?)
}

/// Backs the `cleanup-tasks` CLI command: deletes tasks left dangling by
/// a deleted owner and/or a deleted item. `owner_only`/`item_only` scope
/// the run to just that category; with neither set, both categories are
/// checked (spec §6 `cleanup-tasks [--no-owner-only|--no-item-only]`).
pub async fn delete_orphaned(
    pool: &SqlitePool,
    owner_only: bool,
    item_only: bool,
    dry_run: bool,
) -> Result<Vec<Task>> {
    let check_owner = owner_only || !item_only;
    let check_item = item_only || !owner_only;

    let mut orphaned: Vec<Task> = Vec::new();
    if check_owner {
        orphaned.extend(no_owner(pool).await?);
    }
    if check_item {
        for task in no_item(pool).await? {
            if !orphaned.iter().any(|t| t.id == task.id) {
                orphaned.push(task);
            }
        }
    }

    if !dry_run {
        for task in &orphaned {
            sqlx::query("DELETE FROM tasks WHERE id = ?")
                .bind(&task.id)
                .execute(pool)
                .await?;
        }
    }

    Ok(orphaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{items, users};
    use crate::domain::AuthKind;

    async fn seed_item(pool: &SqlitePool) -> Item {
        let owner = users::create(pool, "alice", Some("alice@example.org"), AuthKind::Local, None, None)
            .await
            .unwrap();
        items::create(pool, "Auth", "auth desc", None, false, false, &owner.id, None, None)
            .await
            .unwrap()
    }

    use crate::domain::Item;

    #[tokio::test]
    async fn create_allocates_unique_short_id() {
        let pool = crate::db::test_pool().await;
        let item = seed_item(&pool).await;

        let t1 = create(&pool, "a", "", &item.id, &item.owner_id, None, None, None)
            .await
            .unwrap();
        let t2 = create(&pool, "b", "", &item.id, &item.owner_id, None, None, None)
            .await
            .unwrap();

        assert_ne!(t1.short_id, t2.short_id);
    }

    #[tokio::test]
    async fn github_close_skips_terminal_tasks() {
        let pool = crate::db::test_pool().await;
        let item = seed_item(&pool).await;
        let t = create(&pool, "a", "", &item.id, &item.owner_id, None, Some(42), None)
            .await
            .unwrap();

        close_manually(&pool, &t.id).await.unwrap();
        let status = apply_github_close(&pool, &t.id).await.unwrap();
        assert_eq!(status, TaskStatus::Done);
    }
}
