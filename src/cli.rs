//! Operator surface (spec §6 "CLI surface"): `poll`, `sync-github`,
//! `cleanup-tasks`, `cleanup-tags`, `sync-tags`, `analyze-logs`. Thin by
//! design — every command drives the same collaborators the server and
//! the background orchestrator use, it just does it once and reports an
//! exit code instead of looping.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::error::Result;
use crate::orchestrator::{Collaborators, Orchestrator, PollSource};

#[derive(Parser, Debug)]
#[command(name = "ideagraph", version, about = "IdeaGraph operator CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs one poller source, either once or on a repeating interval.
    Poll {
        #[arg(long, value_enum)]
        source: PollSourceArg,
        #[arg(long)]
        once: bool,
        /// Overrides the configured poll interval, in seconds.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Full resync of GitHub issues, optionally scoped to one repo.
    SyncGithub {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        verbose: bool,
    },
    /// Deletes tasks left dangling by a deleted owner and/or item.
    CleanupTasks {
        #[arg(long)]
        dry_run: bool,
        /// Scope the run to tasks with no owner.
        #[arg(long)]
        no_owner_only: bool,
        /// Scope the run to tasks with no item.
        #[arg(long)]
        no_item_only: bool,
    },
    /// Deletes tags with a recomputed usage count of zero.
    CleanupTags {
        #[arg(long)]
        dry_run: bool,
    },
    /// Recomputes tag usage counts, all tags or one by id.
    SyncTags {
        #[arg(long)]
        tag_id: Option<String>,
    },
    /// Pulls recent log/error entries and derives candidate tasks.
    AnalyzeLogs {
        #[arg(long)]
        fetch_local: bool,
        #[arg(long)]
        fetch_sentry: bool,
        #[arg(long)]
        analyze: bool,
        #[arg(long)]
        create_tasks: bool,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum PollSourceArg {
    Mail,
    Teams,
    Github,
}

impl From<PollSourceArg> for PollSource {
    fn from(value: PollSourceArg) -> Self {
        match value {
            PollSourceArg::Mail => PollSource::Mail,
            PollSourceArg::Teams => PollSource::Teams,
            PollSourceArg::Github => PollSource::GitHub,
        }
    }
}

/// Runs `command` to completion and returns the process exit code (spec
/// §7: `0` success, `2` partial failure; `1`/`130` are handled by the
/// binary's `main`, for config errors and SIGINT respectively).
pub async fn run(command: Command, collaborators: Arc<Collaborators>) -> Result<i32> {
    match command {
        Command::Poll { source, once, interval } => run_poll(source.into(), once, interval, collaborators).await,
        Command::SyncGithub { owner, repo, dry_run, verbose } => {
            run_sync_github(owner, repo, dry_run, verbose, collaborators).await
        }
        Command::CleanupTasks { dry_run, no_owner_only, no_item_only } => {
            run_cleanup_tasks(dry_run, no_owner_only, no_item_only, collaborators).await
        }
        Command::CleanupTags { dry_run } => run_cleanup_tags(dry_run, collaborators).await,
        Command::SyncTags { tag_id } => run_sync_tags(tag_id, collaborators).await,
        Command::AnalyzeLogs { fetch_local, fetch_sentry, analyze, create_tasks } => {
            run_analyze_logs(fetch_local, fetch_sentry, analyze, create_tasks, collaborators).await
        }
    }
}

async fn run_poll(
    source: PollSource,
    once: bool,
    interval: Option<u64>,
    collaborators: Arc<Collaborators>,
) -> Result<i32> {
    if let Some(secs) = interval {
        let mut settings = collaborators.settings_store.snapshot().await?;
        match source {
            PollSource::Mail => settings.mail.poll_interval_secs = secs,
            PollSource::Teams => settings.teams.poll_interval = secs,
            PollSource::GitHub => settings.github.poll_interval_secs = secs,
        }
        collaborators.settings_store.save(&settings).await?;
    }

    if once {
        let mut orchestrator = Orchestrator::new_with_shared(Arc::clone(&collaborators));
        let report = orchestrator.poll_once(source).await?;
        print_report(&format!("poll --source {}", source.as_str()), &report);
        return Ok(report.exit_code());
    }

    let mut orchestrator = Orchestrator::new_with_shared(Arc::clone(&collaborators));
    orchestrator.start().await?;
    let token = orchestrator.cancellation_token();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "received interrupt, shutting down pollers...".yellow());
        }
        _ = token.cancelled() => {}
    }
    orchestrator.shutdown().await;
    Ok(130)
}

async fn run_sync_github(
    owner: Option<String>,
    repo: Option<String>,
    dry_run: bool,
    verbose: bool,
    collaborators: Arc<Collaborators>,
) -> Result<i32> {
    collaborators
        .settings_store
        .snapshot()
        .await?
        .require_github()?;

    let settings = collaborators.settings_store.snapshot().await?;
    let poller = crate::pollers::GitHubPoller::new(
        &collaborators.pool,
        collaborators.github.as_ref(),
        &collaborators.knowledge,
        settings.github,
    );

    let filter = match (owner.as_deref(), repo.as_deref()) {
        (Some(o), Some(r)) => Some((o, r)),
        _ => None,
    };

    let report = poller.sync_all(filter, dry_run, verbose).await?;
    print_report("sync-github", &report);
    Ok(report.exit_code())
}

async fn run_cleanup_tasks(
    dry_run: bool,
    no_owner_only: bool,
    no_item_only: bool,
    collaborators: Arc<Collaborators>,
) -> Result<i32> {
    let removed =
        crate::db::tasks::delete_orphaned(&collaborators.pool, no_owner_only, no_item_only, dry_run).await?;

    if dry_run {
        println!("{} {} task(s) would be removed:", "[dry-run]".cyan(), removed.len());
    } else {
        println!("removed {} orphaned task(s)", removed.len());
    }
    for task in &removed {
        println!("  - {} {}", task.short_id.dimmed(), task.title);
    }
    Ok(0)
}

async fn run_cleanup_tags(dry_run: bool, collaborators: Arc<Collaborators>) -> Result<i32> {
    let removed = crate::db::tags::delete_unused(&collaborators.pool, dry_run).await?;
    if dry_run {
        println!("{} {} tag(s) would be removed:", "[dry-run]".cyan(), removed.len());
    } else {
        println!("removed {} unused tag(s)", removed.len());
    }
    for tag in &removed {
        println!("  - {}", tag.name);
    }
    Ok(0)
}

async fn run_sync_tags(tag_id: Option<String>, collaborators: Arc<Collaborators>) -> Result<i32> {
    let tags = match tag_id {
        Some(id) => vec![crate::db::tags::get(&collaborators.pool, &id).await?],
        None => crate::db::tags::list(&collaborators.pool).await?,
    };

    for tag in &tags {
        let count = crate::db::tags::recompute_usage_count(&collaborators.pool, &tag.id).await?;
        println!("{} usage_count={}", tag.name, count);
    }
    Ok(0)
}

async fn run_analyze_logs(
    fetch_local: bool,
    fetch_sentry: bool,
    analyze: bool,
    create_tasks: bool,
    collaborators: Arc<Collaborators>,
) -> Result<i32> {
    let mut entries = Vec::new();

    if fetch_local {
        let dir = PathBuf::from(&collaborators.bootstrap.local_log_dir);
        entries.extend(crate::log_analysis::fetch_local(&dir)?);
    }

    if fetch_sentry {
        let (Some(org), Some(project), Some(token)) = (
            collaborators.bootstrap.sentry_org.as_deref(),
            collaborators.bootstrap.sentry_project.as_deref(),
            collaborators.bootstrap.sentry_auth_token.as_deref(),
        ) else {
            return Err(crate::error::IdeaGraphError::InvalidInput(
                "--fetch-sentry requires IDEAGRAPH__SENTRY_ORG/PROJECT/AUTH_TOKEN".to_string(),
            ));
        };
        let base_url = collaborators
            .bootstrap
            .sentry_base_url
            .as_deref()
            .unwrap_or("https://sentry.io");
        entries.extend(crate::log_analysis::fetch_sentry(base_url, token, org, project).await?);
    }

    println!("fetched {} log entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });

    if !analyze {
        return Ok(0);
    }

    let suggestions = crate::log_analysis::analyze(collaborators.agent_gateway.as_ref(), &entries).await;
    println!("derived {} candidate task(s)", suggestions.len());
    for suggestion in &suggestions {
        println!("  - {}", suggestion.title);
    }

    if create_tasks {
        let (Some(item_id), Some(requester_id)) = (
            collaborators.bootstrap.analyze_logs_item_id.as_deref(),
            collaborators.bootstrap.analyze_logs_requester_id.as_deref(),
        ) else {
            return Err(crate::error::IdeaGraphError::InvalidInput(
                "--create-tasks requires IDEAGRAPH__ANALYZE_LOGS_ITEM_ID/REQUESTER_ID".to_string(),
            ));
        };
        let created =
            crate::log_analysis::create_tasks(&collaborators.pool, item_id, requester_id, &suggestions).await?;
        println!("created {created} task(s)");
    }

    Ok(0)
}

fn print_report(label: &str, report: &crate::error::PartialFailureReport) {
    if report.failed == 0 && report.poisoned == 0 {
        println!("{} {label}: {} succeeded", "ok".green(), report.succeeded);
    } else {
        println!(
            "{} {label}: {} succeeded, {} failed, {} poisoned",
            "partial".yellow(),
            report.succeeded,
            report.failed,
            report.poisoned
        );
        for error in &report.errors {
            println!("  - {error}");
        }
    }
}
