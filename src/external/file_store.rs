//! Document-library abstraction that `TaskMover` and file upload sit on
//! top of (spec §4.10, §6 "folder normalization"). Wraps a
//! [`GraphClient`](super::graph::GraphClient) drive and owns the
//! title-to-folder-name normalization algorithm so callers never touch
//! raw Graph paths directly.

use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::thread_token::ThreadTokenCodec;

use super::graph::{GraphClient, UploadedFile};

const MAX_FOLDER_NAME_LEN: usize = 128;

/// Normalizes an arbitrary title into a filesystem/SharePoint-safe folder
/// name: NFKD-normalize, strip characters outside `[A-Za-z0-9 ._-]`,
/// collapse runs of whitespace, then truncate to 128 chars.
pub fn normalize_folder_name(title: &str) -> String {
    let decomposed: String = title.nfkd().collect();
    let filtered: String = decomposed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();

    let collapsed = filtered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let trimmed = collapsed.trim();
    let truncated: String = trimmed.chars().take(MAX_FOLDER_NAME_LEN).collect();

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated
    }
}

/// Appends a `-<shortid>` suffix when a normalized name collides with an
/// existing sibling folder, keeping the combined name within the 128-char
/// budget by trimming the base name first.
pub fn disambiguate_folder_name(base_name: &str, collision_key: &str) -> String {
    let suffix = format!("-{}", ThreadTokenCodec::short_id_for(collision_key));
    let budget = MAX_FOLDER_NAME_LEN.saturating_sub(suffix.len());
    let trimmed_base: String = base_name.chars().take(budget).collect();
    format!("{trimmed_base}{suffix}")
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_id: String,
    pub web_url: String,
    pub folder_path: String,
}

/// Document-library operations keyed by item title rather than raw Graph
/// paths; folder collisions are resolved internally via
/// [`disambiguate_folder_name`].
pub struct FileStore {
    graph: Arc<dyn GraphClient>,
    drive_id: String,
    root_path: String,
}

impl FileStore {
    pub fn new(graph: Arc<dyn GraphClient>, drive_id: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            graph,
            drive_id: drive_id.into(),
            root_path: root_path.into(),
        }
    }

    fn folder_path_for(&self, folder_name: &str) -> String {
        format!("{}/{}", self.root_path.trim_end_matches('/'), folder_name)
    }

    /// Ensures a folder named after `title` exists under the root path,
    /// disambiguating against `collision_key` (normally the item id) only
    /// when the caller already knows a collision occurred.
    pub async fn ensure_folder(&self, title: &str, collision_key: &str, retry_on_collision: bool) -> Result<String> {
        let base_name = normalize_folder_name(title);
        let folder_name = if retry_on_collision {
            disambiguate_folder_name(&base_name, collision_key)
        } else {
            base_name
        };
        self.graph
            .create_folder(&self.drive_id, &self.root_path, &folder_name)
            .await?;
        Ok(folder_name)
    }

    pub async fn upload(&self, folder_name: &str, file_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        let folder_path = self.folder_path_for(folder_name);
        let uploaded: UploadedFile = self
            .graph
            .upload_file(&self.drive_id, &folder_path, file_name, bytes)
            .await?;
        Ok(StoredFile {
            file_id: uploaded.file_id,
            web_url: uploaded.web_url,
            folder_path,
        })
    }

    /// Moves an entire folder's contents by moving the single tracked
    /// file entry (the library models one folder per Item); callers that
    /// need multi-file moves iterate their own file id list.
    pub async fn move_file(&self, file_id: &str, destination_folder_name: &str) -> Result<()> {
        let destination_path = self.folder_path_for(destination_folder_name);
        self.graph
            .move_file(&self.drive_id, file_id, &destination_path)
            .await
    }

    pub async fn delete(&self, file_id: &str) -> Result<()> {
        self.graph.delete_file(&self.drive_id, file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_unsupported_characters() {
        let name = normalize_folder_name("Q3 Report: Budget/Forecast (v2)!");
        assert!(!name.contains(':'));
        assert!(!name.contains('/'));
        assert!(!name.contains('('));
        assert_eq!(name, "Q3 Report BudgetForecast v2");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        let name = normalize_folder_name("  too    many     spaces  ");
        assert_eq!(name, "too many spaces");
    }

    #[test]
    fn normalize_truncates_to_budget() {
        let long = "x".repeat(200);
        let name = normalize_folder_name(&long);
        assert_eq!(name.chars().count(), MAX_FOLDER_NAME_LEN);
    }

    #[test]
    fn normalize_empty_title_falls_back() {
        let name = normalize_folder_name("!!!###");
        assert_eq!(name, "untitled");
    }

    #[test]
    fn disambiguate_appends_short_id_within_budget() {
        let base = "x".repeat(200);
        let name = disambiguate_folder_name(&base, "item-1");
        assert!(name.chars().count() <= MAX_FOLDER_NAME_LEN);
        assert!(name.contains('-'));
    }
}
