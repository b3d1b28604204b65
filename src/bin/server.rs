//! IdeaGraph HTTP server binary.
//!
//! Wires the bootstrap configuration into the shared collaborators, starts
//! the background poller loops, and serves the thin axum surface
//! (health/ask/search/webhooks) until interrupted.

use std::sync::Arc;

use ideagraph::agent_gateway::{AgentGateway, DisabledAgentGateway, HttpAgentGateway};
use ideagraph::api::{self, ApiState};
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

    info!(host = %bootstrap.host, port = bootstrap.port, "starting ideagraph-server");

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

    let collaborators = Arc::new(Collaborators {
        pool,
        settings_store,
        graph,
        github,
        agent_gateway,
        knowledge,
        bootstrap: Arc::new(bootstrap.clone()),
    });

    let mut orchestrator = Orchestrator::new_with_shared(Arc::clone(&collaborators));
    orchestrator.start().await?;

    let state = Arc::new(ApiState::new(Arc::clone(&collaborators)));
    let router = api::build_router(state);

    let addr = format!("{}:{}", bootstrap.host, bootstrap.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "ideagraph-server listening");

    let shutdown = orchestrator.cancellation_token();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = shutdown.cancelled() => {}
            }
            info!("shutdown signal received");
        })
        .await?;

    orchestrator.shutdown().await;
    Ok(())
}
