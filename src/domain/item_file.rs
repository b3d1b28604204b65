use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A document attached to an Item. Extraction happens once, at upload
/// time, via [`crate::content_extractor::ContentExtractor`]; the
/// extracted text is chunked and pushed into the knowledge store as
/// `<fileId>_<n>` KnowledgeObjects rather than stored again here.
/// `storage_path` is the external document library's own file id (what
/// `GraphClient::move_file`/`delete_file` key off of); `web_url` is the
/// deep link surfaced to callers and indexed as the `KnowledgeObject`'s
/// `url` (spec §3: "external-store file id & url").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItemFile {
    pub id: String,
    pub item_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub web_url: String,
    pub chunk_count: i64,
    pub uploaded_by: String,
    pub created_at: i64,
}
