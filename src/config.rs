//! Process configuration and the `Settings` snapshot.
//!
//! Per spec §9 ("Global mutable state"), there is no live-mutable global
//! config object. `Settings` is fetched fresh at the start of every
//! operation via [`SettingsStore::snapshot`] and handed down as an owned,
//! immutable value; editors (out of scope here — a user-facing admin view)
//! write a new row and the next snapshot picks it up. Components may hold
//! their snapshot for the duration of one operation but must not cache it
//! across operations.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::error::{IdeaGraphError, Result};

/// Toggles enumerated in spec §6. Each section carries its own `enabled`
/// flag; disabled features short-circuit with `FeatureDisabled` rather
/// than crashing (spec §6 "Effect of each toggle").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub mail: MailSettings,
    pub teams: TeamsSettings,
    pub github: GitHubSettings,
    pub agent: AgentSettings,
    pub llm_direct: LlmDirectSettings,
    pub vectorindex: VectorIndexSettings,
    pub websearch: WebSearchSettings,
    pub cache: CacheSettings,
    pub file_store: FileStoreSettings,
}

/// Document-library coordinates for `ItemFile` uploads and `TaskMover`
/// folder moves (spec §4.10, §6 "Graph API ... upload/move/delete a
/// file in a document library"). Not in spec §6's enumerated Settings
/// toggle list because the source treats it as fixed deployment config
/// rather than a runtime toggle, but it is needed at the same layer as
/// `mail.mailbox`/`teams.team_id` to actually drive `GraphClient`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileStoreSettings {
    pub drive_id: Option<String>,
    pub root_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailSettings {
    pub enabled: bool,
    pub mailbox: Option<String>,
    pub folder: Option<String>,
    pub outbound_sender: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TeamsSettings {
    pub enabled: bool,
    pub team_id: Option<String>,
    pub welcome_template: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Cached bot principal object-id, resolved on first tick (spec §4.7).
    pub bot_object_id: Option<String>,
    /// The bot's own UPN, known in advance, used to recognize (and cache
    /// the object-id of) its own postings before `bot_object_id` is
    /// resolved (spec §4.7 self-filter tier 2).
    pub service_account_upn: Option<String>,
    /// Fallback self-filter tier 3, compared against a channel message's
    /// sender display name when neither object-id nor UPN is available.
    pub bot_display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GitHubSettings {
    pub enabled: bool,
    pub token: Option<String>,
    pub default_owner: Option<String>,
    pub default_repo: Option<String>,
    pub copilot_user: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentSettings {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmDirectSettings {
    pub enabled: bool,
    pub key: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VectorIndexMode {
    #[default]
    Local,
    Cloud,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VectorIndexSettings {
    pub mode: VectorIndexMode,
    pub url: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebSearchSettings {
    pub google_enabled: bool,
    pub google_key: Option<String>,
    pub google_cx: Option<String>,
    pub brave_key: Option<String>,
}

impl WebSearchSettings {
    pub fn any_enabled(&self) -> bool {
        self.google_enabled || self.brave_key.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CacheBackend {
    #[default]
    Memory,
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    4096
}

impl Settings {
    /// Logs configuration state without ever revealing secret values,
    /// per spec §7 ("Keys are only logged by length").
    pub fn describe_redacted(&self) -> String {
        format!(
            "mail.enabled={} teams.enabled={} github.enabled={} github.token(len={}) agent.enabled={} agent.token(len={}) vectorindex.mode={:?} vectorindex.key(len={})",
            self.mail.enabled,
            self.teams.enabled,
            self.github.enabled,
            self.github.token.as_deref().map(str::len).unwrap_or(0),
            self.agent.enabled,
            self.agent.token.as_deref().map(str::len).unwrap_or(0),
            self.vectorindex.mode,
            self.vectorindex.key.as_deref().map(str::len).unwrap_or(0),
        )
    }

    pub fn require_github(&self) -> Result<()> {
        if !self.github.enabled {
            return Err(IdeaGraphError::feature_disabled("github"));
        }
        Ok(())
    }

    pub fn require_mail(&self) -> Result<()> {
        if !self.mail.enabled {
            return Err(IdeaGraphError::feature_disabled("mail"));
        }
        Ok(())
    }

    pub fn require_teams(&self) -> Result<()> {
        if !self.teams.enabled {
            return Err(IdeaGraphError::feature_disabled("teams"));
        }
        Ok(())
    }

    pub fn require_agent(&self) -> Result<()> {
        if !self.agent.enabled {
            return Err(IdeaGraphError::feature_disabled("agent"));
        }
        Ok(())
    }

    pub fn require_file_store(&self) -> Result<(&str, &str)> {
        match (self.file_store.drive_id.as_deref(), self.file_store.root_path.as_deref()) {
            (Some(drive_id), Some(root_path)) => Ok((drive_id, root_path)),
            _ => Err(IdeaGraphError::feature_disabled("file_store")),
        }
    }
}

/// Reads process-wide defaults (env + optional TOML file) at startup.
/// This is the bootstrap configuration, distinct from the live `Settings`
/// row read per-operation from `DomainStore` — bootstrap config tells us
/// *how to connect* (database URL, server bind address); `Settings`
/// governs *pipeline behavior* and can change without a restart.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Directory `analyze-logs --fetch-local` reads `*.log` files from.
    #[serde(default = "default_local_log_dir")]
    pub local_log_dir: String,
    #[serde(default)]
    pub sentry_base_url: Option<String>,
    #[serde(default)]
    pub sentry_org: Option<String>,
    #[serde(default)]
    pub sentry_project: Option<String>,
    #[serde(default)]
    pub sentry_auth_token: Option<String>,
    /// Item `analyze-logs --create-tasks` files derived tasks against.
    #[serde(default)]
    pub analyze_logs_item_id: Option<String>,
    /// User recorded as the requester on tasks `analyze-logs` creates.
    #[serde(default)]
    pub analyze_logs_requester_id: Option<String>,
    /// Bearer token for Microsoft Graph. Minting/refreshing this token
    /// (Azure AD app registration, client-credentials flow) is an
    /// external concern the core has no opinion on (spec §2 "GraphClient
    /// (external)"); the core only consumes a live token, cached for its
    /// ~55 minute lifetime by [`crate::cache::GraphTokenCache`].
    #[serde(default)]
    pub graph_access_token: Option<String>,
    /// Shared secret GitHub signs webhook deliveries with
    /// (`X-Hub-Signature-256`). Distinct from `github.token` (the PAT used
    /// for outbound REST calls); unset disables webhook-triggered polling,
    /// the background poll loop is unaffected.
    #[serde(default)]
    pub github_webhook_secret: Option<String>,
    /// `clientState` IdeaGraph registered on its Graph change
    /// subscriptions; Graph echoes it back on every notification so the
    /// webhook handler can reject forged payloads without a per-payload
    /// signature (Graph notifications carry no HMAC).
    #[serde(default)]
    pub graph_webhook_client_state: Option<String>,
}

fn default_database_url() -> String {
    "sqlite:data/ideagraph.db".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_local_log_dir() -> String {
    "./logs".to_string()
}

impl BootstrapConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .set_default("database_url", default_database_url())?
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("request_timeout_secs", default_request_timeout() as i64)?
            .add_source(config::Environment::with_prefix("IDEAGRAPH").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reads/writes the `Settings` singleton row in `DomainStore`.
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (id INTEGER PRIMARY KEY CHECK (id = 1), payload TEXT NOT NULL, updated_at BIGINT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch an immutable snapshot. Returns defaults if no row exists yet.
    pub async fn snapshot(&self) -> Result<Settings> {
        let row: Option<(String,)> = sqlx::query_as("SELECT payload FROM settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((payload,)) => {
                serde_json::from_str(&payload).map_err(|e| IdeaGraphError::InvalidInput(e.to_string()))
            }
            None => Ok(Settings::default()),
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let payload = serde_json::to_string(settings)
            .map_err(|e| IdeaGraphError::InvalidInput(e.to_string()))?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO settings (id, payload, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
