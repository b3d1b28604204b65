//! Moves a Task between Items, dragging its file folder along in the
//! external file store (spec §4.10).

use sqlx::SqlitePool;
use tracing::error;

use crate::db::{items, tasks};
use crate::error::Result;
use crate::external::file_store::FileStore;
use crate::knowledge::KnowledgeSync;

pub struct TaskMover<'a> {
    pool: &'a SqlitePool,
    file_store: &'a FileStore,
    knowledge: &'a KnowledgeSync,
}

impl<'a> TaskMover<'a> {
    pub fn new(pool: &'a SqlitePool, file_store: &'a FileStore, knowledge: &'a KnowledgeSync) -> Self {
        Self {
            pool,
            file_store,
            knowledge,
        }
    }

    /// Moves `task_id` from its current Item into `destination_item_id`.
    /// A failure between the file-store move and the DB update leaves
    /// the Task's folder and its `item_id` pointing at different Items;
    /// this is logged at error level with both ids so an out-of-scope
    /// janitor can reconcile it (spec §4.10 step 5 note).
    pub async fn move_task(&self, task_id: &str, destination_item_id: &str, file_id: Option<&str>) -> Result<()> {
        let task = tasks::get(self.pool, task_id).await?;
        let destination = items::get(self.pool, destination_item_id).await?;

        let folder_name = self
            .file_store
            .ensure_folder(&destination.title, &destination.id, false)
            .await?;

        if let Some(file_id) = file_id {
            if let Err(e) = self.file_store.move_file(file_id, &folder_name).await {
                error!(
                    task_id,
                    from_item_id = %task.item_id,
                    to_item_id = destination_item_id,
                    error = %e,
                    "task folder move failed; DB item_id not yet updated, manual reconciliation required"
                );
                return Err(e);
            }
        }

        tasks::set_item(self.pool, task_id, destination_item_id).await?;

        let moved = tasks::get(self.pool, task_id).await?;
        self.knowledge.upsert_task(self.pool, &moved).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // `move_task` exercises three collaborators (DomainStore, FileStore,
    // KnowledgeSync) behind live HTTP traits; integration coverage lives
    // alongside the pollers' wiremock-backed tests rather than here.
}
