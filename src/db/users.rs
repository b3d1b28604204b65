use sqlx::SqlitePool;

use crate::domain::{AuthKind, User};
use crate::error::{IdeaGraphError, Result};

/// Looks up a user by the external object-id (the authoritative key for
/// federated sources — spec §4.3).
pub async fn find_by_object_id(pool: &SqlitePool, object_id: &str) -> Result<Option<User>> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_object_id = ?")
            .bind(object_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Looks up a user by normalized email (lower-cased, trimmed by the
/// caller before this is called — see `identity::normalize_email`).
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn find_by_login(pool: &SqlitePool, login: &str) -> Result<Option<User>> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE login = ?")
            .bind(login)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("user {id}")))
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &SqlitePool,
    login: &str,
    email: Option<&str>,
    auth_kind: AuthKind,
    external_object_id: Option<&str>,
    display_name: Option<&str>,
) -> Result<User> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO users (id, login, email, auth_kind, external_object_id, display_name, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(login)
    .bind(email)
    .bind(auth_kind.as_str())
    .bind(external_object_id)
    .bind(display_name)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

/// Patches in an object-id discovered after the row was created without
/// one (spec §4.3: "if an existing row lacks the external object-id and
/// we now have it, patch it").
pub async fn patch_object_id(pool: &SqlitePool, user_id: &str, object_id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET external_object_id = ? WHERE id = ? AND external_object_id IS NULL")
        .bind(object_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
