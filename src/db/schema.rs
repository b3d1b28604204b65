use sqlx::SqlitePool;

use crate::error::Result;

/// Creates every table the store depends on, and applies any columns
/// added since the first release. Safe to call on every boot: `CREATE
/// TABLE IF NOT EXISTS` plus best-effort `ALTER TABLE ADD COLUMN` that
/// swallows the "duplicate column" error sqlite raises on a rerun.
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            login TEXT NOT NULL,
            email TEXT,
            auth_kind TEXT NOT NULL DEFAULT 'federated',
            external_object_id TEXT,
            display_name TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_object_id ON users(external_object_id) WHERE external_object_id IS NOT NULL")
        .execute(pool)
        .await?;
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email) WHERE email IS NOT NULL")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            usage_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            parent_id TEXT REFERENCES items(id),
            is_template INTEGER NOT NULL DEFAULT 0,
            inherit_context INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'new',
            owner_id TEXT NOT NULL REFERENCES users(id),
            external_channel_id TEXT,
            source_repo TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_source_repo ON items(source_repo)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_tags (
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (item_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'new',
            item_id TEXT NOT NULL REFERENCES items(id),
            requester_id TEXT NOT NULL REFERENCES users(id),
            assigned_id TEXT REFERENCES users(id),
            github_issue_number INTEGER,
            source_message_id TEXT,
            short_id TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_item ON tasks(item_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_github_issue ON tasks(item_id, github_issue_number) WHERE github_issue_number IS NOT NULL")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_tags (
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (task_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_comments (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            author_id TEXT REFERENCES users(id),
            body TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'api',
            direction TEXT NOT NULL DEFAULT 'inbound',
            source_message_id TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_task_comments_task ON task_comments(task_id, created_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_files (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            storage_path TEXT NOT NULL,
            web_url TEXT NOT NULL DEFAULT '',
            chunk_count INTEGER NOT NULL DEFAULT 0,
            uploaded_by TEXT NOT NULL REFERENCES users(id),
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_files_item ON item_files(item_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS milestones (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date INTEGER,
            status TEXT NOT NULL DEFAULT 'new',
            summary TEXT,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS milestone_context_objects (
            id TEXT PRIMARY KEY,
            milestone_id TEXT NOT NULL REFERENCES milestones(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            raw_content TEXT NOT NULL DEFAULT '',
            summary TEXT,
            proposed_tasks_json TEXT NOT NULL DEFAULT '[]',
            analyzed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_mco_milestone ON milestone_context_objects(milestone_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_answers (
            id TEXT PRIMARY KEY,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            item_id TEXT REFERENCES items(id),
            asked_by TEXT REFERENCES users(id),
            source TEXT NOT NULL DEFAULT 'api',
            sources_json TEXT NOT NULL DEFAULT '[]',
            saved_as_knowledge INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_qa_item ON question_answers(item_id)")
        .execute(pool)
        .await?;

    // Poller cursor + poisoned-message sidecar (spec §4.7, §5 backpressure).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS poller_cursors (
            source TEXT PRIMARY KEY,
            cursor_at INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS poisoned_messages (
            source TEXT NOT NULL,
            source_message_id TEXT NOT NULL,
            failure_count INTEGER NOT NULL DEFAULT 0,
            poisoned INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (source, source_message_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            payload TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Columns added after the first release; ignore "duplicate column" on rerun.
    let _ = sqlx::query("ALTER TABLE item_files ADD COLUMN chunk_count INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await;
    let _ = sqlx::query("ALTER TABLE item_files ADD COLUMN web_url TEXT NOT NULL DEFAULT ''")
        .execute(pool)
        .await;
    let _ = sqlx::query("ALTER TABLE question_answers ADD COLUMN sources_json TEXT NOT NULL DEFAULT '[]'")
        .execute(pool)
        .await;
    let _ = sqlx::query("ALTER TABLE question_answers ADD COLUMN saved_as_knowledge INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await;

    Ok(())
}
