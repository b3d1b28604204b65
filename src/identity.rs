//! Translates a source-side principal (email, UPN, object-id, GitHub
//! login) into a local [`User`], creating it idempotently if absent
//! (spec §4.3).

use sqlx::SqlitePool;
use tracing::warn;

use crate::db::users;
use crate::domain::{AuthKind, User};
use crate::error::Result;

/// One of the principal shapes a source hands us. Mail supplies only an
/// address; Teams supplies the full triple; GitHub supplies a login.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub email: Option<String>,
    pub upn: Option<String>,
    pub object_id: Option<String>,
    pub display_name: Option<String>,
    pub login: Option<String>,
}

impl Principal {
    pub fn from_email(email: &str) -> Self {
        Self {
            email: Some(normalize_email(email)),
            ..Default::default()
        }
    }

    pub fn from_teams(object_id: &str, upn: Option<&str>, display_name: Option<&str>) -> Self {
        Self {
            email: upn.map(normalize_email),
            upn: upn.map(normalize_email),
            object_id: Some(object_id.to_string()),
            display_name: display_name.map(str::to_string),
            login: None,
        }
    }

    pub fn from_github_login(login: &str) -> Self {
        Self {
            login: Some(login.to_string()),
            ..Default::default()
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub struct IdentityResolver<'a> {
    pool: &'a SqlitePool,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolution order (spec §4.3): object-id first (authoritative for
    /// federated sources), then normalized email/UPN, then a brand-new
    /// federated user. Never fails the caller's pipeline — on a genuine
    /// key collision (two rows matching different keys that should be
    /// the same principal) it logs and proceeds with whichever row
    /// matched first, rather than blocking.
    pub async fn resolve(&self, principal: &Principal) -> Result<User> {
        if let Some(object_id) = &principal.object_id {
            if let Some(existing) = users::find_by_object_id(self.pool, object_id).await? {
                return Ok(existing);
            }
        }

        let email_key = principal.email.as_deref().or(principal.upn.as_deref());
        if let Some(email) = email_key {
            if let Some(existing) = users::find_by_email(self.pool, email).await? {
                if let Some(object_id) = &principal.object_id {
                    if existing.external_object_id.is_none() {
                        users::patch_object_id(self.pool, &existing.id, object_id).await?;
                        return users::get(self.pool, &existing.id).await;
                    } else if existing.external_object_id.as_deref() != Some(object_id.as_str()) {
                        warn!(
                            user_id = %existing.id,
                            "identity lookup collision: email matches but object-id differs; proceeding with existing row"
                        );
                    }
                }
                return Ok(existing);
            }
        }

        if let Some(login) = &principal.login {
            if let Some(existing) = users::find_by_login(self.pool, login).await? {
                return Ok(existing);
            }
        }

        let login = principal
            .login
            .clone()
            .or_else(|| principal.display_name.clone())
            .or_else(|| email_key.map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        users::create(
            self.pool,
            &login,
            email_key,
            AuthKind::Federated,
            principal.object_id.as_deref(),
            principal.display_name.as_deref(),
        )
        .await
    }

    /// A synthetic "unknown" user used when a message's sender can't be
    /// resolved to anything at all, so the pipeline can still proceed
    /// (spec §4.3: "caller logs and proceeds with a synthetic unknown
    /// user when appropriate").
    pub async fn unknown_user(&self) -> Result<User> {
        if let Some(existing) = users::find_by_login(self.pool, "unknown").await? {
            return Ok(existing);
        }
        users::create(self.pool, "unknown", None, AuthKind::Federated, None, Some("Unknown sender")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_by_object_id_before_email() {
        let pool = crate::db::test_pool().await;
        let resolver = IdentityResolver::new(&pool);

        let first = resolver
            .resolve(&Principal::from_teams("obj-1", Some("Bob@Example.ORG"), Some("Bob")))
            .await
            .unwrap();

        let second = resolver
            .resolve(&Principal::from_teams("obj-1", None, None))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn creates_federated_user_when_absent() {
        let pool = crate::db::test_pool().await;
        let resolver = IdentityResolver::new(&pool);

        let user = resolver
            .resolve(&Principal::from_email("alice@example.org"))
            .await
            .unwrap();

        assert_eq!(user.auth_kind(), AuthKind::Federated);
        assert_eq!(user.email.as_deref(), Some("alice@example.org"));
    }

    #[tokio::test]
    async fn patches_missing_object_id_on_existing_row() {
        let pool = crate::db::test_pool().await;
        let resolver = IdentityResolver::new(&pool);

        let created = resolver
            .resolve(&Principal::from_email("bob@example.org"))
            .await
            .unwrap();
        assert!(created.external_object_id.is_none());

        let patched = resolver
            .resolve(&Principal::from_teams("obj-9", Some("bob@example.org"), Some("Bob")))
            .await
            .unwrap();

        assert_eq!(patched.id, created.id);
        assert_eq!(patched.external_object_id.as_deref(), Some("obj-9"));
    }
}
