//! Wire types for the thin API surface (spec §1 "a thin axum surface";
//! CRUD/admin/auth views stay out of scope per spec §1, so this module
//! only carries the request/response shapes `handlers.rs` actually uses).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub asked_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub question_answer_id: String,
    pub answer: String,
    pub context: String,
    pub sources: Vec<crate::rag::ContextSection>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_alpha")]
    pub alpha: f32,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
}

fn default_search_alpha() -> f32 {
    0.6
}

fn default_search_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct SearchResponseItem {
    pub id: String,
    pub score: f32,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub item_id: Option<String>,
    pub task_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mail_enabled: bool,
    pub teams_enabled: bool,
    pub github_enabled: bool,
    pub agent_enabled: bool,
    pub vectorindex_mode: &'static str,
}

/// Upload body. `content_base64` rather than a multipart stream keeps
/// this thin surface JSON-only like the rest of the API (spec §1: the
/// thin surface is a JSON façade, multipart parsing belongs to the
/// out-of-scope web/UI layer).
#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub item_id: String,
    pub file_name: String,
    pub content_type: String,
    pub content_base64: String,
    pub uploaded_by: String,
}

#[derive(Debug, Serialize)]
pub struct UploadFileResponse {
    pub item_file_id: String,
    pub chunk_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PollTriggeredResponse {
    pub source: &'static str,
    pub succeeded: u32,
    pub failed: u32,
    pub poisoned: u32,
}
