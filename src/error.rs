//! Error taxonomy
//!
//! IdeaGraph distinguishes errors by how the caller is expected to react,
//! not by subsystem. Every pipeline stage catches its own collaborator
//! errors and translates them into one of these kinds before they cross a
//! module boundary (mirrors the `DbError`/`GitHubError` split the rest of
//! this workspace follows, generalized into one taxonomy per spec §7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdeaGraphError>;

/// Top-level error kind for the core pipeline.
#[derive(Error, Debug)]
pub enum IdeaGraphError {
    /// Network/5xx/rate-limit errors from an external collaborator. The
    /// caller should retry (poller: next tick; request handler: backoff).
    #[error("transient error calling {collaborator}: {message}")]
    Transient {
        collaborator: &'static str,
        message: String,
    },

    /// 4xx auth/validation errors from an external collaborator. Logged
    /// with full detail server-side; surfaced to callers sanitized.
    #[error("permanent error calling {collaborator}: {user_message}")]
    Permanent {
        collaborator: &'static str,
        user_message: String,
    },

    /// An agent returned something that didn't parse against its schema.
    /// Callers fall back to a structurally valid default; this variant
    /// exists so the fallback path can still be logged uniformly.
    #[error("malformed agent output from {agent}: {detail}")]
    MalformedAgentOutput { agent: &'static str, detail: String },

    /// A domain invariant was violated at a write boundary (duplicate
    /// short-id, cycle in Item parent chain, Task without an Item, ...).
    #[error("domain conflict: {reason}")]
    DomainConflict { reason: String },

    /// A feature toggle in `Settings` is off while the feature was invoked.
    #[error("feature disabled: {feature}")]
    FeatureDisabled { feature: &'static str },

    /// Lookup collided on two different identity keys (IdentityResolver).
    #[error("identity lookup conflict: {detail}")]
    LookupConflict { detail: String },

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IdeaGraphError {
    pub fn transient(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            collaborator,
            message: message.into(),
        }
    }

    pub fn permanent(collaborator: &'static str, user_message: impl Into<String>) -> Self {
        Self::Permanent {
            collaborator,
            user_message: user_message.into(),
        }
    }

    pub fn feature_disabled(feature: &'static str) -> Self {
        Self::FeatureDisabled { feature }
    }

    /// Used where the caller doesn't yet know which named agent produced
    /// the bad output (e.g. a gateway-wide transport error) and the
    /// `agent` field is filled in with a generic marker.
    pub fn malformed_agent_output(detail: impl Into<String>) -> Self {
        Self::MalformedAgentOutput {
            agent: "agent_gateway",
            detail: detail.into(),
        }
    }

    pub fn malformed_agent_output_from(agent: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedAgentOutput {
            agent,
            detail: detail.into(),
        }
    }

    pub fn domain_conflict(reason: impl Into<String>) -> Self {
        Self::DomainConflict {
            reason: reason.into(),
        }
    }

    /// True for error kinds a poller tick or request handler should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Sanitized message safe to return to an end caller: never includes
    /// stack traces, internal hostnames, or key material.
    pub fn user_message(&self) -> String {
        match self {
            Self::Permanent { user_message, .. } => user_message.clone(),
            Self::FeatureDisabled { feature } => format!("{feature} is not configured"),
            Self::DomainConflict { reason } => reason.clone(),
            Self::NotFound(what) => format!("not found: {what}"),
            Self::InvalidInput(what) => format!("invalid input: {what}"),
            _ => "an internal error occurred".to_string(),
        }
    }
}

/// Summary of a pipeline-partial run (spec §7 "Pipeline-partial").
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PartialFailureReport {
    pub succeeded: u32,
    pub failed: u32,
    pub poisoned: u32,
    pub errors: Vec<String>,
}

impl PartialFailureReport {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, detail: impl Into<String>) {
        self.failed += 1;
        self.errors.push(detail.into());
    }

    pub fn record_poisoned(&mut self) {
        self.poisoned += 1;
    }

    /// CLI/process exit code: 0 if anything succeeded, 2 otherwise (spec §7).
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 && self.poisoned == 0 {
            0
        } else if self.succeeded > 0 {
            2
        } else {
            2
        }
    }
}
