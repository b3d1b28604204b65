//! Supervises the three source pollers: start/stop, per-source interval
//! override, graceful cancellation, and the on-demand `poll_once` entry
//! points tests and manual triggers use (spec §2 "Orchestrator").

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent_gateway::AgentGateway;
use crate::config::{BootstrapConfig, SettingsStore};
use crate::error::{PartialFailureReport, Result};
use crate::external::github::GitHubClient;
use crate::external::graph::GraphClient;
use crate::knowledge::KnowledgeSync;
use crate::pollers::{GitHubPoller, MailPoller, TeamsPoller};

/// Which poller a caller wants to drive one-shot (spec §6 CLI `poll
/// --source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSource {
    Mail,
    Teams,
    GitHub,
}

impl PollSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Teams => "teams",
            Self::GitHub => "github",
        }
    }
}

/// The external collaborators the orchestrator wires into each poller
/// tick. Held behind `Arc` so the same instances are shared across the
/// background loop and any on-demand `poll_once` calls.
pub struct Collaborators {
    pub pool: SqlitePool,
    pub settings_store: Arc<SettingsStore>,
    pub graph: Arc<dyn GraphClient>,
    pub github: Arc<GitHubClient>,
    pub agent_gateway: Arc<dyn AgentGateway>,
    pub knowledge: Arc<KnowledgeSync>,
    /// Process-level config (database URL, bind address, log/sentry
    /// paths for `analyze-logs`). Distinct from the live `Settings` row
    /// the rest of the fields are derived from.
    pub bootstrap: Arc<BootstrapConfig>,
}

/// Supervises background polling loops. Each source runs in its own
/// `tokio` task, polling at its own configured interval, and stops as
/// soon as the shared [`CancellationToken`] fires — a single `shutdown()`
/// call drains every source cooperatively rather than aborting tasks
/// mid-tick.
pub struct Orchestrator {
    collaborators: Arc<Collaborators>,
    cancellation: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self::new_with_shared(Arc::new(collaborators))
    }

    /// Like [`Self::new`], but takes collaborators already behind an
    /// `Arc` so a CLI command can hold the same handle for its own
    /// direct DomainStore/collaborator calls alongside the orchestrator.
    pub fn new_with_shared(collaborators: Arc<Collaborators>) -> Self {
        Self {
            collaborators,
            cancellation: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Spawns a background loop per enabled source, reading the poll
    /// interval from the current `Settings` snapshot at the start of
    /// each tick so an interval change takes effect without a restart.
    pub async fn start(&mut self) -> Result<()> {
        let settings = self.collaborators.settings_store.snapshot().await?;

        if settings.mail.enabled {
            self.handles.push(self.spawn_loop(PollSource::Mail));
        }
        if settings.teams.enabled {
            self.handles.push(self.spawn_loop(PollSource::Teams));
        }
        if settings.github.enabled {
            self.handles.push(self.spawn_loop(PollSource::GitHub));
        }

        Ok(())
    }

    fn spawn_loop(&self, source: PollSource) -> JoinHandle<()> {
        let collaborators = Arc::clone(&self.collaborators);
        let cancellation = self.cancellation.clone();

        tokio::spawn(async move {
            loop {
                let tick = Self::run_once(&collaborators, source).await;
                match tick {
                    Ok(report) if report.failed > 0 || report.poisoned > 0 => {
                        warn!(
                            source = source.as_str(),
                            succeeded = report.succeeded,
                            failed = report.failed,
                            poisoned = report.poisoned,
                            "poller tick completed with partial failures"
                        );
                    }
                    Ok(report) => {
                        info!(source = source.as_str(), succeeded = report.succeeded, "poller tick completed");
                    }
                    Err(e) => {
                        error!(source = source.as_str(), error = %e, "poller tick failed outright");
                    }
                }

                let interval = Self::interval_for(&collaborators, source).await;
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!(source = source.as_str(), "poller loop stopped");
        })
    }

    async fn interval_for(collaborators: &Collaborators, source: PollSource) -> Duration {
        let secs = match collaborators.settings_store.snapshot().await {
            Ok(settings) => match source {
                PollSource::Mail => settings.mail.poll_interval_secs,
                PollSource::Teams => settings.teams.poll_interval,
                PollSource::GitHub => settings.github.poll_interval_secs,
            },
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "failed to read settings for poll interval; defaulting to 60s");
                60
            }
        };
        Duration::from_secs(secs.max(1))
    }

    /// Runs exactly one tick of `source`, for the background loop and for
    /// on-demand callers (tests, CLI `--once`, manual triggers) alike.
    pub async fn poll_once(&self, source: PollSource) -> Result<PartialFailureReport> {
        Self::run_once(&self.collaborators, source).await
    }

    async fn run_once(collaborators: &Collaborators, source: PollSource) -> Result<PartialFailureReport> {
        let settings = collaborators.settings_store.snapshot().await?;

        let result = match source {
            PollSource::Mail => {
                let poller = MailPoller::new(
                    &collaborators.pool,
                    collaborators.graph.as_ref(),
                    collaborators.agent_gateway.as_ref(),
                    &collaborators.knowledge,
                    settings.mail,
                );
                poller.poll_once().await
            }
            PollSource::Teams => {
                let poller = TeamsPoller::new(
                    &collaborators.pool,
                    collaborators.graph.as_ref(),
                    collaborators.agent_gateway.as_ref(),
                    &collaborators.knowledge,
                    &collaborators.settings_store,
                    settings.teams,
                );
                poller.poll_once().await
            }
            PollSource::GitHub => {
                let poller = GitHubPoller::new(
                    &collaborators.pool,
                    collaborators.github.as_ref(),
                    &collaborators.knowledge,
                    settings.github,
                );
                poller.poll_once().await
            }
        };

        if let Ok(report) = &result {
            crate::metrics::track_poller_tick(source.as_str(), report.succeeded, report.failed, report.poisoned).await;
        }

        result
    }

    /// Signals every running loop to stop after its current tick and
    /// waits for them to exit (spec §2 "graceful cancellation").
    pub async fn shutdown(&mut self) {
        self.cancellation.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "poller loop task panicked during shutdown");
            }
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}
