use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A normalized label attachable to Items/Tasks. `usage_count` is
/// recomputed by `sync-tags`/`cleanup-tags`; it is never trusted as
/// authoritative the way a foreign-key count would be (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub usage_count: i64,
    pub created_at: i64,
}

/// Normalize a tag name: lowercase, trim, collapse internal whitespace to
/// single hyphens. Two different-looking inputs that normalize to the
/// same string are the same Tag.
pub fn normalize_tag_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_and_case() {
        assert_eq!(normalize_tag_name("  Auth   Service "), "auth-service");
        assert_eq!(normalize_tag_name("AUTH"), "auth");
    }
}
