//! Cursor persistence and the poisoned-message sidecar (spec §4.7, §5
//! backpressure): "after 5 failed ticks on the same source id, mark it
//! as poisoned, log at CRITICAL, and skip."

use sqlx::SqlitePool;
use tracing::error;

use crate::error::Result;

/// Threshold at which a repeatedly-failing source message is marked
/// poisoned and skipped rather than retried forever.
pub const POISON_THRESHOLD: i64 = 5;

pub async fn get_cursor(pool: &SqlitePool, source: &str) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT cursor_at FROM poller_cursors WHERE source = ?")
        .bind(source)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(c,)| c).unwrap_or(0))
}

/// Advances the cursor. Callers only invoke this after every side
/// effect for the processed batch has succeeded (spec §4.7: "advance
/// cursor only after all side-effects succeed").
pub async fn advance_cursor(pool: &SqlitePool, source: &str, new_cursor: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO poller_cursors (source, cursor_at) VALUES (?, ?)
        ON CONFLICT(source) DO UPDATE SET cursor_at = excluded.cursor_at
        WHERE excluded.cursor_at > poller_cursors.cursor_at
        "#,
    )
    .bind(source)
    .bind(new_cursor)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records a processing failure for one source message. Returns `true`
/// if this failure just pushed the message over the poison threshold.
pub async fn record_failure(
    pool: &SqlitePool,
    source: &str,
    source_message_id: &str,
    error_detail: &str,
) -> Result<bool> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO poisoned_messages (source, source_message_id, failure_count, poisoned, last_error, updated_at)
        VALUES (?, ?, 1, 0, ?, ?)
        ON CONFLICT(source, source_message_id) DO UPDATE SET
            failure_count = poisoned_messages.failure_count + 1,
            last_error = excluded.last_error,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(source)
    .bind(source_message_id)
    .bind(error_detail)
    .bind(now)
    .execute(pool)
    .await?;

    let (failure_count, poisoned): (i64, i64) = sqlx::query_as(
        "SELECT failure_count, poisoned FROM poisoned_messages WHERE source = ? AND source_message_id = ?",
    )
    .bind(source)
    .bind(source_message_id)
    .fetch_one(pool)
    .await?;

    if poisoned == 0 && failure_count >= POISON_THRESHOLD {
        sqlx::query(
            "UPDATE poisoned_messages SET poisoned = 1 WHERE source = ? AND source_message_id = ?",
        )
        .bind(source)
        .bind(source_message_id)
        .execute(pool)
        .await?;
        error!(
            source,
            source_message_id,
            failure_count,
            "message poisoned after repeated processing failures"
        );
        return Ok(true);
    }

    Ok(false)
}

pub async fn is_poisoned(pool: &SqlitePool, source: &str, source_message_id: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT poisoned FROM poisoned_messages WHERE source = ? AND source_message_id = ?",
    )
    .bind(source)
    .bind(source_message_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(p,)| p != 0).unwrap_or(false))
}

pub async fn clear_failure(pool: &SqlitePool, source: &str, source_message_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM poisoned_messages WHERE source = ? AND source_message_id = ?")
        .bind(source)
        .bind(source_message_id)
        .execute(pool)
        .await?;
    Ok(())
}
