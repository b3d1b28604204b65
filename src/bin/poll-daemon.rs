//! Background poll daemon: runs the mail/Teams/GitHub poller loops with no
//! HTTP surface attached, for deployments that split ingestion from the
//! API process. Mirrors `ideagraph-server`'s collaborator wiring minus the
//! axum router.

use std::sync::Arc;

use ideagraph::agent_gateway::{AgentGateway, DisabledAgentGateway, HttpAgentGateway};
use ideagraph::config::{BootstrapConfig, SettingsStore};
use ideagraph::db;
use ideagraph::external::github::GitHubClient;
use ideagraph::external::graph::HttpGraphClient;
use ideagraph::knowledge::{CloudVectorIndex, KnowledgeSync, LocalVectorIndex};
use ideagraph::orchestrator::{Collaborators, Orchestrator};
use ideagraph::telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let bootstrap = BootstrapConfig::load()?;

    let telemetry = match &bootstrap.otlp_endpoint {
        Some(endpoint) => TelemetryConfig::production(endpoint.clone()),
        None => TelemetryConfig::development(),
    };
    init_telemetry(telemetry).await?;

    info!("starting ideagraph-poll-daemon");

    let pool = db::init_db(&bootstrap.database_url).await?;
    let settings_store = Arc::new(SettingsStore::new(pool.clone()));
    settings_store.ensure_table().await?;
    let settings = settings_store.snapshot().await?;
    info!(settings = %settings.describe_redacted(), "loaded settings");

    let graph: Arc<dyn ideagraph::external::graph::GraphClient> = Arc::new(HttpGraphClient::new(
        bootstrap.graph_access_token.clone().unwrap_or_default(),
    )?);

    let github = Arc::new(GitHubClient::new(
        settings.github.token.clone().unwrap_or_default(),
    )?);

    let agent_gateway: Arc<dyn AgentGateway> = match HttpAgentGateway::new(&settings.agent)? {
        Some(gateway) => Arc::new(gateway),
        None => Arc::new(DisabledAgentGateway),
    };

    let vector_index: Arc<dyn ideagraph::knowledge::VectorIndexClient> = match settings.vectorindex.mode {
        ideagraph::config::VectorIndexMode::Cloud => {
            let url = settings
                .vectorindex
                .url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("vectorindex.url is required when vectorindex.mode is cloud"))?;
            Arc::new(CloudVectorIndex::new(url, settings.vectorindex.key.as_deref())?)
        }
        ideagraph::config::VectorIndexMode::Local => {
            let snapshot_path = std::path::PathBuf::from(&bootstrap.database_url)
                .parent()
                .map(|p| p.join("vector_index.bin"));
            let index = LocalVectorIndex::new(snapshot_path);
            index.load()?;
            Arc::new(index)
        }
    };
    let knowledge = Arc::new(KnowledgeSync::new(vector_index));

    let collaborators = Collaborators {
        pool,
        settings_store,
        graph,
        github,
        agent_gateway,
        knowledge,
        bootstrap: Arc::new(bootstrap),
    };

    let mut orchestrator = Orchestrator::new(collaborators);
    orchestrator.start().await?;
    let token = orchestrator.cancellation_token();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down pollers...");
        }
        _ = token.cancelled() => {}
    }

    orchestrator.shutdown().await;
    info!("ideagraph-poll-daemon stopped");
    Ok(())
}
