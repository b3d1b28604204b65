use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How a [`User`] authenticates. `Local` users are created by an
/// out-of-scope admin view; `Federated` users are created lazily by
/// [`crate::identity::IdentityResolver`] from a source-side principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    Local,
    Federated,
}

impl AuthKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Federated => "federated",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "local" => Self::Local,
            _ => Self::Federated,
        }
    }
}

/// A person known to IdeaGraph: the requester, assignee, or owner of an
/// Item/Task. Never deleted by the core (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub login: String,
    pub email: Option<String>,
    pub auth_kind: String,
    pub external_object_id: Option<String>,
    pub display_name: Option<String>,
    pub created_at: i64,
}

impl User {
    pub fn auth_kind(&self) -> AuthKind {
        AuthKind::parse(&self.auth_kind)
    }
}
