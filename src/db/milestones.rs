//! `Milestone` / `MilestoneContextObject` storage plus the analysis
//! pass that turns a context object's raw content into an AI-generated
//! summary and proposed task list (spec §3).

use sqlx::SqlitePool;
use tracing::warn;

use crate::agent_gateway::{AgentGateway, AgentInvocation, AgentName};
use crate::domain::{Milestone, MilestoneContextKind, MilestoneContextObject, ProposedTask};
use crate::error::{IdeaGraphError, Result};

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Milestone> {
    sqlx::query_as::<_, Milestone>("SELECT * FROM milestones WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("milestone {id}")))
}

pub async fn list_for_item(pool: &SqlitePool, item_id: &str) -> Result<Vec<Milestone>> {
    Ok(sqlx::query_as::<_, Milestone>(
        "SELECT * FROM milestones WHERE item_id = ? ORDER BY created_at DESC",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &SqlitePool,
    item_id: &str,
    title: &str,
    description: &str,
    due_date: Option<i64>,
    created_by: &str,
) -> Result<Milestone> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO milestones (id, item_id, title, description, due_date, status, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, 'new', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(item_id)
    .bind(title)
    .bind(description)
    .bind(due_date)
    .bind(created_by)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

pub async fn set_status(pool: &SqlitePool, id: &str, status: &str) -> Result<()> {
    let result = sqlx::query("UPDATE milestones SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(IdeaGraphError::NotFound(format!("milestone {id}")));
    }
    Ok(())
}

/// Rolls up every context object's own summary into the milestone's
/// aggregated `summary` field (spec §3 "aggregated summary").
async fn refresh_aggregated_summary(pool: &SqlitePool, milestone_id: &str) -> Result<()> {
    let objects = context_objects(pool, milestone_id).await?;
    let summaries: Vec<&str> = objects.iter().filter_map(|o| o.summary.as_deref()).collect();
    let aggregated = if summaries.is_empty() {
        None
    } else {
        Some(summaries.join("\n\n"))
    };

    sqlx::query("UPDATE milestones SET summary = ? WHERE id = ?")
        .bind(aggregated)
        .bind(milestone_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn add_context_object(
    pool: &SqlitePool,
    milestone_id: &str,
    kind: MilestoneContextKind,
    title: &str,
    raw_content: &str,
) -> Result<MilestoneContextObject> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO milestone_context_objects (id, milestone_id, kind, title, raw_content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(milestone_id)
    .bind(kind.as_str())
    .bind(title)
    .bind(raw_content)
    .bind(now)
    .execute(pool)
    .await?;

    get_context_object(pool, &id).await
}

pub async fn get_context_object(pool: &SqlitePool, id: &str) -> Result<MilestoneContextObject> {
    sqlx::query_as::<_, MilestoneContextObject>("SELECT * FROM milestone_context_objects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("milestone_context_object {id}")))
}

pub async fn context_objects(pool: &SqlitePool, milestone_id: &str) -> Result<Vec<MilestoneContextObject>> {
    Ok(sqlx::query_as::<_, MilestoneContextObject>(
        "SELECT * FROM milestone_context_objects WHERE milestone_id = ? ORDER BY created_at ASC",
    )
    .bind(milestone_id)
    .fetch_all(pool)
    .await?)
}

#[derive(serde::Deserialize)]
struct RawDerivation {
    #[serde(default)]
    tasks: Vec<ProposedTask>,
}

/// Runs `text-summary` and `text-analysis-task-derivation` over a
/// context object's raw content, stores the results, flips `analyzed`,
/// and refreshes the owning milestone's aggregated summary (spec §3:
/// "AI-generated summary", "proposed task list", "analyzed flag").
/// Best-effort like the rest of the agent-backed pipeline stages: a
/// failed sub-call leaves that half empty rather than aborting the
/// other.
pub async fn analyze_context_object(
    pool: &SqlitePool,
    gateway: &dyn AgentGateway,
    context_object_id: &str,
) -> Result<MilestoneContextObject> {
    let object = get_context_object(pool, context_object_id).await?;

    let summary_invocation = AgentInvocation::new(object.raw_content.clone());
    let summary = match gateway.invoke(AgentName::TextSummary, summary_invocation).await {
        Ok(response) => response
            .result
            .as_str()
            .map(str::to_string)
            .or_else(|| response.result.get("summary").and_then(|v| v.as_str()).map(str::to_string)),
        Err(e) => {
            warn!(context_object_id, error = %e, "text-summary call failed");
            None
        }
    };

    let derivation_params = serde_json::json!({ "content": object.raw_content });
    let derivation_invocation = AgentInvocation::new(object.raw_content.clone()).with_params(derivation_params);
    let proposed_tasks = match gateway
        .invoke(AgentName::TextAnalysisTaskDerivation, derivation_invocation)
        .await
    {
        Ok(response) => match serde_json::from_value::<RawDerivation>(response.result) {
            Ok(parsed) => parsed.tasks,
            Err(e) => {
                warn!(context_object_id, error = %e, "text-analysis-task-derivation returned malformed JSON");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(context_object_id, error = %e, "text-analysis-task-derivation call failed");
            Vec::new()
        }
    };

    let proposed_tasks_json = serde_json::to_string(&proposed_tasks).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        "UPDATE milestone_context_objects SET summary = ?, proposed_tasks_json = ?, analyzed = 1 WHERE id = ?",
    )
    .bind(&summary)
    .bind(&proposed_tasks_json)
    .bind(context_object_id)
    .execute(pool)
    .await?;

    refresh_aggregated_summary(pool, &object.milestone_id).await?;

    get_context_object(pool, context_object_id).await
}
