//! Handlers for the thin API surface (spec §1: health, RAG ask, search,
//! webhook ingress for Teams/GitHub; CRUD/admin/auth views stay out of
//! scope and aren't wired here).

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::types::{
    AskRequest, AskResponse, HealthResponse, PollTriggeredResponse, SearchRequest, SearchResponseItem,
    UploadFileRequest, UploadFileResponse,
};
use crate::domain::QaSource;
use crate::error::IdeaGraphError;
use crate::knowledge::{KnowledgeObjectType, SearchFilter};
use crate::orchestrator::{Collaborators, Orchestrator, PollSource};
use crate::rag::RagPipeline;

pub struct ApiState {
    pub collaborators: Arc<Collaborators>,
}

impl ApiState {
    pub fn new(collaborators: Arc<Collaborators>) -> Self {
        Self { collaborators }
    }
}

/// Maps the core error taxonomy onto an HTTP status + sanitized body
/// (spec §7 "user-visible messages never contain stack traces ... API
/// keys").
impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IdeaGraphError::NotFound(_) => StatusCode::NOT_FOUND,
            IdeaGraphError::InvalidInput(_) | IdeaGraphError::DomainConflict { .. } => StatusCode::BAD_REQUEST,
            IdeaGraphError::FeatureDisabled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            IdeaGraphError::Permanent { .. } => StatusCode::BAD_GATEWAY,
            IdeaGraphError::Transient { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(super::types::ApiError { error: self.0.user_message() })).into_response()
    }
}

pub struct ApiErrorResponse(pub IdeaGraphError);

impl From<IdeaGraphError> for ApiErrorResponse {
    fn from(e: IdeaGraphError) -> Self {
        Self(e)
    }
}

pub async fn health_check(State(state): State<Arc<ApiState>>) -> Result<Json<HealthResponse>, ApiErrorResponse> {
    let settings = state.collaborators.settings_store.snapshot().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        mail_enabled: settings.mail.enabled,
        teams_enabled: settings.teams.enabled,
        github_enabled: settings.github.enabled,
        agent_enabled: settings.agent.enabled,
        vectorindex_mode: match settings.vectorindex.mode {
            crate::config::VectorIndexMode::Local => "local",
            crate::config::VectorIndexMode::Cloud => "cloud",
        },
    }))
}

pub async fn metrics(State(_state): State<Arc<ApiState>>) -> String {
    crate::metrics::global_registry().export_prometheus().await
}

/// Runs the full RAG pipeline (spec §4.8) and logs the exchange as a
/// [`crate::domain::QuestionAnswer`] for audit/support-advisor reuse.
pub async fn ask(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiErrorResponse> {
    if request.question.trim().is_empty() {
        return Err(IdeaGraphError::InvalidInput("question must not be empty".to_string()).into());
    }

    let collaborators = &state.collaborators;
    let pipeline = RagPipeline::new(collaborators.agent_gateway.as_ref(), &collaborators.knowledge);
    let result = pipeline.answer(&request.question, request.item_id.as_deref()).await;

    let sources: Vec<crate::domain::QaSourceRef> = result
        .sources
        .iter()
        .map(|s| crate::domain::QaSourceRef {
            id: s.id.clone(),
            title: s.title.clone(),
            kind: s.kind.as_str().to_string(),
            score: s.score,
        })
        .collect();

    let saved = crate::db::question_answers::record(
        &collaborators.pool,
        &request.question,
        &result.answer,
        request.item_id.as_deref(),
        request.asked_by.as_deref(),
        QaSource::Api,
        &sources,
    )
    .await?;

    Ok(Json(AskResponse {
        question_answer_id: saved.id,
        answer: result.answer,
        context: result.context,
        sources: result.sources,
    }))
}

/// Thin pass-through to [`crate::knowledge::KnowledgeSync::search`]
/// (spec §4.4 `search`).
pub async fn search(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResponseItem>>, ApiErrorResponse> {
    let kind = request
        .kind
        .as_deref()
        .map(parse_knowledge_object_type)
        .transpose()?;

    let filter = SearchFilter {
        kind,
        item_id: request.item_id.clone(),
    };

    let hits = state
        .collaborators
        .knowledge
        .search(&request.query, request.alpha, request.limit, &filter)
        .await?;

    Ok(Json(
        hits.into_iter()
            .map(|hit| SearchResponseItem {
                id: hit.id,
                score: hit.score,
                kind: hit.properties.kind.as_str(),
                title: hit.properties.title,
                item_id: hit.properties.item_id,
                task_id: hit.properties.task_id,
                url: hit.properties.url,
            })
            .collect(),
    ))
}

/// Uploads a file into an Item's document-library folder and indexes
/// its extracted text (spec §5 "File ingestion", §8 scenario 6).
pub async fn upload_file(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UploadFileRequest>,
) -> Result<Json<UploadFileResponse>, ApiErrorResponse> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let collaborators = &state.collaborators;
    let settings = collaborators.settings_store.snapshot().await?;
    let (drive_id, root_path) = settings.require_file_store()?;

    let item = crate::db::items::get(&collaborators.pool, &request.item_id).await?;
    let file_store = crate::external::file_store::FileStore::new(
        std::sync::Arc::clone(&collaborators.graph),
        drive_id,
        root_path,
    );

    let bytes = STANDARD
        .decode(request.content_base64.as_bytes())
        .map_err(|e| IdeaGraphError::InvalidInput(format!("invalid base64 payload: {e}")))?;

    let file = crate::file_ingestion::ingest_file(
        &collaborators.pool,
        &file_store,
        &collaborators.knowledge,
        &item.id,
        &item.title,
        &request.file_name,
        &request.content_type,
        &bytes,
        &request.uploaded_by,
    )
    .await?;

    Ok(Json(UploadFileResponse {
        item_file_id: file.id,
        chunk_count: file.chunk_count,
    }))
}

fn parse_knowledge_object_type(raw: &str) -> Result<KnowledgeObjectType, ApiErrorResponse> {
    match raw {
        "Item" => Ok(KnowledgeObjectType::Item),
        "Task" => Ok(KnowledgeObjectType::Task),
        "GitHubIssue" => Ok(KnowledgeObjectType::GitHubIssue),
        "File" => Ok(KnowledgeObjectType::File),
        "Context" => Ok(KnowledgeObjectType::Context),
        "QA" => Ok(KnowledgeObjectType::Qa),
        other => Err(IdeaGraphError::InvalidInput(format!("unknown knowledge object type: {other}")).into()),
    }
}

/// GitHub webhook ingress: verifies `X-Hub-Signature-256` against
/// `github_webhook_secret`, then nudges the GitHub poller rather than
/// waiting for its next tick. The event payload itself is never parsed
/// here — `poll_once` re-fetches from the REST API, which is the single
/// place issue/PR state is translated into domain writes.
pub async fn github_webhook(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<PollTriggeredResponse>, ApiErrorResponse> {
    let secret = state
        .collaborators
        .bootstrap
        .github_webhook_secret
        .as_deref()
        .ok_or_else(|| IdeaGraphError::feature_disabled("github_webhook"))?;

    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| IdeaGraphError::InvalidInput("missing X-Hub-Signature-256 header".to_string()))?;

    if !crate::webhooks::verify_github_signature(secret, &body, signature) {
        warn!("rejected github webhook delivery with invalid signature");
        return Err(IdeaGraphError::permanent("github_webhook", "invalid signature").into());
    }

    Ok(Json(trigger_poll(&state.collaborators, PollSource::GitHub).await?))
}

/// Handles both halves of Microsoft Graph change notifications: the
/// subscription-creation handshake (`?validationToken=...`, echoed back
/// verbatim) and steady-state notifications (`clientState` checked, then
/// the relevant poller is nudged).
pub async fn graph_webhook(
    State(state): State<Arc<ApiState>>,
    uri: axum::http::Uri,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, ApiErrorResponse> {
    if let Some(query) = uri.query() {
        if let Some(token) = crate::webhooks::validation_token_response(query) {
            return Ok((StatusCode::OK, token).into_response());
        }
    }

    let configured = state
        .collaborators
        .bootstrap
        .graph_webhook_client_state
        .as_deref()
        .ok_or_else(|| IdeaGraphError::feature_disabled("graph_webhook"))?;

    let notifications = payload.get("value").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let mut source = None;
    for notification in &notifications {
        let client_state = notification.get("clientState").and_then(|v| v.as_str());
        if !crate::webhooks::verify_graph_client_state(configured, client_state) {
            warn!("rejected graph notification with mismatched clientState");
            continue;
        }
        let resource = notification.get("resource").and_then(|v| v.as_str()).unwrap_or("");
        if resource.contains("/channels/") || resource.contains("/messages") && resource.contains("/teams/") {
            source = Some(PollSource::Teams);
        } else if resource.contains("/mailFolders/") || resource.contains("/messages") {
            source = Some(PollSource::Mail);
        }
    }

    let Some(source) = source else {
        // every notification's clientState mismatched, or the batch was
        // empty; Graph still expects a 202 so it doesn't retry forever.
        return Ok(StatusCode::ACCEPTED.into_response());
    };

    Ok(Json(trigger_poll(&state.collaborators, source).await?).into_response())
}

async fn trigger_poll(
    collaborators: &Arc<Collaborators>,
    source: PollSource,
) -> Result<PollTriggeredResponse, ApiErrorResponse> {
    let orchestrator = Orchestrator::new_with_shared(Arc::clone(collaborators));
    let report = orchestrator.poll_once(source).await?;
    info!(
        source = source.as_str(),
        succeeded = report.succeeded,
        failed = report.failed,
        "webhook-triggered poll completed"
    );
    Ok(PollTriggeredResponse {
        source: source.as_str(),
        succeeded: report.succeeded,
        failed: report.failed,
        poisoned: report.poisoned,
    })
}
