//! IdeaGraph operator CLI binary: `poll`, `sync-github`, `cleanup-tasks`,
//! `cleanup-tags`, `sync-tags`, `analyze-logs`. Builds the same
//! collaborators the server uses and drives `ideagraph::cli::run` once.

use std::sync::Arc;

use clap::Parser;
use ideagraph::agent_gateway::{AgentGateway, DisabledAgentGateway, HttpAgentGateway};
use ideagraph::cli::Cli;
use ideagraph::config::{BootstrapConfig, SettingsStore};
use ideagraph::db;
use ideagraph::external::github::GitHubClient;
use ideagraph::external::graph::HttpGraphClient;
use ideagraph::knowledge::{CloudVectorIndex, KnowledgeSync, LocalVectorIndex};
use ideagraph::orchestrator::Collaborators;
use ideagraph::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let bootstrap = BootstrapConfig::load()?;

    init_telemetry(TelemetryConfig {
        enable_stdout: true,
        ..TelemetryConfig::default()
    })
    .await?;

    let pool = db::init_db(&bootstrap.database_url).await?;
    let settings_store = Arc::new(SettingsStore::new(pool.clone()));
    settings_store.ensure_table().await?;
    let settings = settings_store.snapshot().await?;

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
        bootstrap: Arc::new(bootstrap),
    });

    let exit_code = ideagraph::cli::run(cli.command, collaborators).await?;
    std::process::exit(exit_code);
}
