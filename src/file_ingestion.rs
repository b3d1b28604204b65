//! File ingestion (spec §5 "File ingestion" / §4.5 `ContentExtractor`):
//! upload to the external document library, extract + chunk, index each
//! chunk into `KnowledgeObject`, and record the owning [`ItemFile`] row.
//!
//! This is the orchestration layer `content_extractor.rs` and
//! `knowledge::sync` deliberately don't own themselves — both are pure
//! w.r.t. their own inputs, so the wiring lives here, one level up,
//! mirroring the way `task_mover.rs` sits above `external::file_store`
//! and `knowledge::sync` without either depending on the other.

use sqlx::SqlitePool;

use crate::content_extractor::{ContentExtractor, ContentKind};
use crate::db::item_files;
use crate::domain::ItemFile;
use crate::error::Result;
use crate::external::file_store::FileStore;
use crate::knowledge::KnowledgeSync;

/// Uploads `bytes` into `item_id`'s document-library folder, extracts
/// and chunks its text, upserts one `KnowledgeObject` per chunk, and
/// records the `ItemFile` row (spec §8 scenario 6: "File upload →
/// chunks indexed").
pub async fn ingest_file(
    pool: &SqlitePool,
    file_store: &FileStore,
    knowledge: &KnowledgeSync,
    item_id: &str,
    item_title: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
    uploaded_by: &str,
) -> Result<ItemFile> {
    let kind = ContentKind::from_mime(content_type)?;
    let chunks = ContentExtractor::extract(kind, bytes, file_name)?;

    let folder_name = file_store.ensure_folder(item_title, item_id, false).await?;
    let stored = file_store.upload(&folder_name, file_name, bytes).await?;

    let file = item_files::create(
        pool,
        item_id,
        file_name,
        content_type,
        bytes.len() as i64,
        &stored.file_id,
        &stored.web_url,
        chunks.len() as i64,
        uploaded_by,
    )
    .await?;

    let pairs: Vec<(String, String)> = chunks.into_iter().map(|c| (c.title, c.body)).collect();
    knowledge.upsert_file_chunks(&file, &pairs, 0).await?;

    Ok(file)
}

/// Re-extracts and re-chunks an already-uploaded file's bytes (e.g.
/// after an edit), replacing its `KnowledgeObject` chunks in place and
/// dropping any trailing indices a shrinking edit leaves behind (spec
/// §9 "File-chunk identifiers").
pub async fn reindex_file(
    pool: &SqlitePool,
    knowledge: &KnowledgeSync,
    file_id: &str,
    bytes: &[u8],
) -> Result<ItemFile> {
    let file = item_files::get(pool, file_id).await?;
    let kind = ContentKind::from_mime(&file.content_type)?;
    let chunks = ContentExtractor::extract(kind, bytes, &file.file_name)?;

    let pairs: Vec<(String, String)> = chunks.into_iter().map(|c| (c.title, c.body)).collect();
    knowledge.upsert_file_chunks(&file, &pairs, file.chunk_count).await?;
    item_files::set_chunk_count(pool, file_id, pairs.len() as i64).await?;

    item_files::get(pool, file_id).await
}

/// Deletes `file_id`'s remote file, its `KnowledgeObject` chunks, and
/// its `ItemFile` row, in that order (spec §3: "Deleting an ItemFile
/// removes the remote file and all derived knowledge chunks").
pub async fn delete_file(
    pool: &SqlitePool,
    file_store: &FileStore,
    knowledge: &KnowledgeSync,
    file_id: &str,
) -> Result<()> {
    let file = item_files::get(pool, file_id).await?;

    file_store.delete(&file.storage_path).await?;
    knowledge.delete_file(&file.id, file.chunk_count).await;
    item_files::delete(pool, file_id).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_content_type_before_any_upload() {
        let err = ContentKind::from_mime("application/zip");
        assert!(err.is_err());
    }
}
