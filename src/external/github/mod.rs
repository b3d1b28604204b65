//! GitHub REST client: issues list/get/create, PR get, comments, auth via
//! PAT. Carried over from the original GitHub integration, which already
//! covered issues/PRs/commits/rate-limiting; the comment-creation call and
//! the since-cursor issue listing were added for the poller.

mod client;
pub mod models;

pub use client::{GitHubClient, GitHubConfig, RateLimitInfo};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitHubError>;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("github config error: {0}")]
    ConfigError(String),
    #[error("github auth error: {0}")]
    AuthError(String),
    #[error("github api error: {0}")]
    ApiError(String),
    #[error("github rate limit exceeded, resets at {reset_at}")]
    RateLimitExceeded { reset_at: chrono::DateTime<chrono::Utc> },
    #[error("github {resource_type} not found: {id}")]
    NotFound { resource_type: String, id: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl GitHubError {
    /// Maps onto the core error taxonomy: rate limits and generic API
    /// hiccups are transient, auth/not-found are permanent.
    pub fn into_core_error(self) -> crate::error::IdeaGraphError {
        match self {
            Self::RateLimitExceeded { .. } | Self::Http(_) => {
                crate::error::IdeaGraphError::transient("github", self.to_string())
            }
            Self::AuthError(_) | Self::ConfigError(_) => {
                crate::error::IdeaGraphError::permanent("github", "GitHub authentication failed")
            }
            Self::NotFound { .. } => {
                crate::error::IdeaGraphError::NotFound(self.to_string())
            }
            Self::ApiError(_) => crate::error::IdeaGraphError::transient("github", self.to_string()),
        }
    }
}
