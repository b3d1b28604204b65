//! GitHub poller (spec §4.7, §9): for every Item with a bound
//! `source_repo`, polls that repo's issues since the last cursor,
//! upserts Tasks by `(item_id, github_issue_number)`, and applies the
//! terminal-respecting close/push status transitions (spec §4.2 table,
//! §8 "Terminal respect").

use sqlx::SqlitePool;
use tracing::warn;

use crate::config::GitHubSettings;
use crate::db::{items, pollers as poller_db, tasks};
use crate::error::{IdeaGraphError, PartialFailureReport, Result};
use crate::external::github::models::IssueState;
use crate::external::github::GitHubClient;
use crate::knowledge::KnowledgeSync;

use super::MAX_PER_TICK;

const SOURCE_PREFIX: &str = "github";

pub struct GitHubPoller<'a> {
    pool: &'a SqlitePool,
    client: &'a GitHubClient,
    knowledge: &'a KnowledgeSync,
    settings: GitHubSettings,
}

impl<'a> GitHubPoller<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        client: &'a GitHubClient,
        knowledge: &'a KnowledgeSync,
        settings: GitHubSettings,
    ) -> Self {
        Self {
            pool,
            client,
            knowledge,
            settings,
        }
    }

    /// Runs one tick across every Item bound to a `source_repo`. Skips
    /// all work for this tick once the client's cached rate-limit
    /// headroom drops under the warning threshold, so a single noisy
    /// repo doesn't exhaust the whole token's quota mid-tick.
    pub async fn poll_once(&self) -> Result<PartialFailureReport> {
        if !self.settings.enabled {
            return Err(IdeaGraphError::feature_disabled("github"));
        }

        let mut report = PartialFailureReport::default();
        let bound_items = items::list_with_source_repo(self.pool).await?;

        for item in bound_items {
            let Some(source_repo) = item.source_repo.clone() else {
                continue;
            };
            let Some((owner, repo)) = source_repo.split_once('/') else {
                warn!(source_repo, "item source_repo is not in owner/repo form; skipping");
                continue;
            };

            if let Some(rate_limit) = self.client.get_cached_rate_limit().await {
                if rate_limit.is_exhausted(50) {
                    warn!(
                        owner,
                        repo,
                        remaining = rate_limit.remaining,
                        reset_at = %rate_limit.reset,
                        "github rate limit nearly exhausted; deferring remaining repos to next tick"
                    );
                    break;
                }
            }

            let source = format!("{SOURCE_PREFIX}:{source_repo}");
            let cursor = poller_db::get_cursor(self.pool, &source).await?;
            let since = chrono::DateTime::from_timestamp(cursor, 0).unwrap_or_else(chrono::Utc::now);

            let issues = match self.client.list_issues_since(owner, repo, since).await {
                Ok(issues) => issues,
                Err(e) => {
                    let core_error = e.into_core_error();
                    warn!(owner, repo, error = %core_error, "github issue listing failed");
                    report.record_failure(core_error.to_string());
                    continue;
                }
            };

            let mut advance_to = cursor;

            for issue in issues.into_iter().take(MAX_PER_TICK) {
                if issue.pull_request.is_some() {
                    // Pull requests surface in the issues endpoint; this poller only tracks issues.
                    advance_to = advance_to.max(issue.updated_at.timestamp());
                    continue;
                }

                let ts = issue.updated_at.timestamp();
                let issue_key = issue.id.to_string();

                if poller_db::is_poisoned(self.pool, &source, &issue_key).await? {
                    advance_to = advance_to.max(ts);
                    continue;
                }

                match self.sync_issue(&item.id, &issue).await {
                    Ok(()) => {
                        report.record_success();
                        poller_db::clear_failure(self.pool, &source, &issue_key).await.ok();
                        advance_to = advance_to.max(ts);
                    }
                    Err(e) => {
                        warn!(owner, repo, issue_number = issue.number, error = %e, "github issue sync failed");
                        report.record_failure(e.to_string());
                        match poller_db::record_failure(self.pool, &source, &issue_key, &e.to_string()).await {
                            Ok(true) => {
                                report.record_poisoned();
                                advance_to = advance_to.max(ts);
                            }
                            _ => break,
                        }
                    }
                }
            }

            poller_db::advance_cursor(self.pool, &source, advance_to).await?;
        }

        Ok(report)
    }

    /// Full resync of every issue (not just the ones since the last
    /// cursor) for items whose `source_repo` matches `filter`, or for
    /// every bound item when `filter` is `None`. Backs the `sync-github`
    /// CLI command, which is an administrative one-shot distinct from
    /// the cursor-based continuous `poll --source github` loop. In
    /// `dry_run` mode nothing is written; the report's `succeeded` count
    /// is instead the number of issues that *would* have synced.
    pub async fn sync_all(
        &self,
        filter: Option<(&str, &str)>,
        dry_run: bool,
        verbose: bool,
    ) -> Result<PartialFailureReport> {
        if !self.settings.enabled {
            return Err(IdeaGraphError::feature_disabled("github"));
        }

        let mut report = PartialFailureReport::default();
        let bound_items = items::list_with_source_repo(self.pool).await?;

        for item in bound_items {
            let Some(source_repo) = item.source_repo.clone() else {
                continue;
            };
            let Some((owner, repo)) = source_repo.split_once('/') else {
                continue;
            };
            if let Some((f_owner, f_repo)) = filter {
                if owner != f_owner || repo != f_repo {
                    continue;
                }
            }

            let issues = match self.client.list_issues(owner, repo, Some("all")).await {
                Ok(issues) => issues,
                Err(e) => {
                    report.record_failure(e.into_core_error().to_string());
                    continue;
                }
            };

            for issue in issues {
                if issue.pull_request.is_some() {
                    continue;
                }
                if verbose {
                    tracing::info!(owner, repo, issue_number = issue.number, state = ?issue.state, "sync-github: processing issue");
                }
                if dry_run {
                    report.record_success();
                    continue;
                }
                match self.sync_issue(&item.id, &issue).await {
                    Ok(()) => report.record_success(),
                    Err(e) => {
                        warn!(owner, repo, issue_number = issue.number, error = %e, "sync-github: issue sync failed");
                        report.record_failure(e.to_string());
                    }
                }
            }
        }

        Ok(report)
    }

    /// Upserts the Task that tracks `issue` under `item_id`, creating it
    /// if this is the first time the poller has seen this issue number
    /// for the Item, and applies the close/push transitions otherwise
    /// (spec §4.2: "terminal respect" — `Done`/`Testing` are never
    /// auto-overwritten).
    async fn sync_issue(&self, item_id: &str, issue: &crate::external::github::models::Issue) -> Result<()> {
        let issue_number = issue.number as i64;
        let existing = tasks::find_by_github_issue(self.pool, item_id, issue_number).await?;

        let task = match existing {
            Some(task) => {
                if issue.state == IssueState::Closed {
                    tasks::apply_github_close(self.pool, &task.id).await?;
                }
                tasks::get(self.pool, &task.id).await?
            }
            None => {
                let owner = items::get(self.pool, item_id).await?.owner_id;
                let created = tasks::create(
                    self.pool,
                    &issue.title,
                    issue.body.as_deref().unwrap_or(""),
                    item_id,
                    &owner,
                    None,
                    Some(issue_number),
                    None,
                )
                .await?;
                // New issues derive their initial status from the issue's
                // own state (spec §4.7: "open->new, closed->testing").
                if issue.state == IssueState::Closed {
                    tasks::apply_github_close(self.pool, &created.id).await?;
                    tasks::get(self.pool, &created.id).await?
                } else {
                    created
                }
            }
        };

        self.knowledge
            .upsert_github_issue(
                &task,
                &issue.title,
                issue.body.as_deref().unwrap_or(""),
                match issue.state {
                    IssueState::Open => "open",
                    IssueState::Closed => "closed",
                },
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // `poll_once`/`sync_issue` drive a live GitHubClient over HTTP;
    // integration coverage lives in wiremock-backed tests rather than
    // here.
}
