//! Backs the `analyze-logs` CLI command: pulls recent log lines from a
//! local directory or from Sentry, asks `text-analysis-task-derivation`
//! to turn the noisy ones into candidate Tasks, and optionally writes
//! them. Distinct from the RAG/classifier pipeline — this is an
//! operator-triggered sweep, not something a poller runs continuously.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

use crate::agent_gateway::{AgentGateway, AgentInvocation, AgentName};
use crate::db::tasks;
use crate::error::{IdeaGraphError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub source: String,
    pub level: String,
    pub message: String,
}

/// Reads every `*.log` file directly under `dir` (non-recursive), one
/// entry per non-blank line. Lines are classified `error`/`warn`/`info`
/// by a plain substring check on a bracketed level tag — no regex,
/// since log lines are attacker-adjacent input (spec's ReDoS stance,
/// carried over from `content_extractor`).
pub fn fetch_local(dir: &Path) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();

    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            return Err(IdeaGraphError::InvalidInput(format!(
                "cannot read log directory {}: {e}",
                dir.display()
            )))
        }
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        let source = path.display().to_string();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            entries.push(LogEntry {
                source: source.clone(),
                level: classify_level(line),
                message: line.to_string(),
            });
        }
    }

    Ok(entries)
}

fn classify_level(line: &str) -> String {
    let upper = line.to_ascii_uppercase();
    if upper.contains("ERROR") || upper.contains("PANIC") || upper.contains("FATAL") {
        "error".to_string()
    } else if upper.contains("WARN") {
        "warn".to_string()
    } else {
        "info".to_string()
    }
}

/// Pulls recent unresolved issues from a Sentry project via its REST
/// API (`GET /api/0/projects/{org}/{project}/issues/`).
pub async fn fetch_sentry(
    base_url: &str,
    auth_token: &str,
    org: &str,
    project: &str,
) -> Result<Vec<LogEntry>> {
    #[derive(Deserialize)]
    struct SentryIssue {
        title: String,
        #[serde(default)]
        level: Option<String>,
        culprit: Option<String>,
    }

    let url = format!("{base_url}/api/0/projects/{org}/{project}/issues/?query=is:unresolved");
    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .bearer_auth(auth_token)
        .send()
        .await
        .map_err(|e| IdeaGraphError::transient("sentry", e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IdeaGraphError::permanent(
            "sentry",
            format!("sentry returned status {status}"),
        ));
    }

    let issues: Vec<SentryIssue> = response
        .json()
        .await
        .map_err(|e| IdeaGraphError::transient("sentry", e.to_string()))?;

    Ok(issues
        .into_iter()
        .map(|issue| LogEntry {
            source: issue.culprit.unwrap_or_else(|| "sentry".to_string()),
            level: issue.level.unwrap_or_else(|| "error".to_string()),
            message: issue.title,
        })
        .collect())
}

/// One candidate Task the agent derived from a batch of log entries.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSuggestion {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct RawDerivation {
    #[serde(default)]
    tasks: Vec<TaskSuggestion>,
}

/// Calls `text-analysis-task-derivation` with the whole batch (capped at
/// 200 entries so one call doesn't exceed the agent's context budget)
/// and returns the suggested tasks. Degrades to an empty list rather
/// than propagating on any agent error, matching `Classifier::classify`.
pub async fn analyze(gateway: &dyn AgentGateway, entries: &[LogEntry]) -> Vec<TaskSuggestion> {
    if entries.is_empty() {
        return Vec::new();
    }
    let batch: Vec<&LogEntry> = entries.iter().take(200).collect();
    let params = serde_json::json!({ "entries": batch });
    let prompt = format!("Derive actionable tasks from {} log entries.", batch.len());
    let invocation = AgentInvocation::new(prompt).with_params(params);

    match gateway
        .invoke(AgentName::TextAnalysisTaskDerivation, invocation)
        .await
    {
        Ok(response) => match serde_json::from_value::<RawDerivation>(response.result) {
            Ok(parsed) => parsed.tasks,
            Err(e) => {
                warn!(error = %e, "text-analysis-task-derivation returned malformed JSON");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(error = %e, "text-analysis-task-derivation call failed");
            Vec::new()
        }
    }
}

/// Writes each suggestion as a new Task against `item_id`, requested by
/// `requester_id` (typically a service account representing the CLI
/// operator).
pub async fn create_tasks(
    pool: &SqlitePool,
    item_id: &str,
    requester_id: &str,
    suggestions: &[TaskSuggestion],
) -> Result<usize> {
    let mut created = 0;
    for suggestion in suggestions {
        tasks::create(
            pool,
            &suggestion.title,
            &suggestion.description,
            item_id,
            requester_id,
            None,
            None,
            None,
        )
        .await?;
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_error_level() {
        assert_eq!(classify_level("2026-01-01 ERROR something broke"), "error");
        assert_eq!(classify_level("2026-01-01 WARN slow query"), "warn");
        assert_eq!(classify_level("2026-01-01 INFO request handled"), "info");
    }

    #[test]
    fn fetch_local_rejects_missing_directory() {
        let err = fetch_local(Path::new("/nonexistent/does-not-exist")).unwrap_err();
        assert!(matches!(err, IdeaGraphError::InvalidInput(_)));
    }
}
