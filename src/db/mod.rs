//! DomainStore: durable storage of the domain entities and their
//! invariants (spec §3). Any transactional relational store satisfies
//! the contract; this implementation targets SQLite via sqlx, the way
//! the pollers and the thin API both depend on a single `SqlitePool`.

mod schema;

pub mod item_files;
pub mod items;
pub mod milestones;
pub mod pollers;
pub mod question_answers;
pub mod tags;
pub mod task_comments;
pub mod tasks;
pub mod users;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::Result;

/// Opens the pool and brings the schema up to date. Creates the sqlite
/// file's parent directory and an empty file first if `database_url`
/// names a path that doesn't exist yet, so a fresh checkout boots
/// without a separate migration step.
pub async fn init_db(database_url: &str) -> Result<SqlitePool> {
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        let path = path.split('?').next().unwrap_or(path);
        let file_path = std::path::Path::new(path);
        if file_path != std::path::Path::new(":memory:") {
            if let Some(parent) = file_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).ok();
                }
            }
            if !file_path.exists() {
                std::fs::File::create(file_path).ok();
            }
        }
    }

    // sqlite defaults FK enforcement to off; the schema's `ON DELETE
    // CASCADE` constraints (item deletion cascading to tasks/files/etc.)
    // depend on this being set per-connection.
    let connect_options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    schema::create_tables(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    init_db("sqlite::memory:").await.expect("in-memory pool")
}
