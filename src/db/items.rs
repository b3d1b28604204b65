use sqlx::SqlitePool;

use crate::domain::{would_create_cycle, Item, ParentLookup};
use crate::error::{IdeaGraphError, Result};

/// `would_create_cycle` takes a synchronous lookup; since the pool call
/// is async, we resolve the whole ancestor chain eagerly before running
/// the synchronous detector against it.
struct ResolvedChain(std::collections::HashMap<String, String>);

impl ParentLookup for ResolvedChain {
    fn parent_of(&self, item_id: &str) -> Option<String> {
        self.0.get(item_id).cloned()
    }
}

async fn resolve_chain(pool: &SqlitePool, start: &str) -> Result<ResolvedChain> {
    use crate::domain::MAX_PARENT_DEPTH;

    let mut map = std::collections::HashMap::new();
    let mut current = start.to_string();

    for _ in 0..=MAX_PARENT_DEPTH {
        let parent: Option<(Option<String>,)> =
            sqlx::query_as("SELECT parent_id FROM items WHERE id = ?")
                .bind(&current)
                .fetch_optional(pool)
                .await?;

        match parent.and_then(|(p,)| p) {
            Some(p) => {
                map.insert(current.clone(), p.clone());
                if map.len() > MAX_PARENT_DEPTH * 2 {
                    break; // already-cyclic data; let the detector catch it
                }
                current = p;
            }
            None => break,
        }
    }

    Ok(ResolvedChain(map))
}

/// Checks whether setting `candidate_parent` as `item_id`'s parent would
/// create a cycle, walking the live table (spec §9).
pub async fn would_parent_cycle(pool: &SqlitePool, item_id: &str, candidate_parent: &str) -> Result<bool> {
    let chain = resolve_chain(pool, candidate_parent).await?;
    Ok(would_create_cycle(&chain, item_id, candidate_parent))
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Item> {
    sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| IdeaGraphError::NotFound(format!("item {id}")))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Item>> {
    Ok(sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?)
}

pub async fn list_with_source_repo(pool: &SqlitePool) -> Result<Vec<Item>> {
    Ok(sqlx::query_as::<_, Item>(
        "SELECT * FROM items WHERE source_repo IS NOT NULL ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn find_by_source_repo(pool: &SqlitePool, owner_repo: &str) -> Result<Option<Item>> {
    Ok(
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE source_repo = ?")
            .bind(owner_repo)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn find_by_channel_id(pool: &SqlitePool, channel_id: &str) -> Result<Vec<Item>> {
    Ok(sqlx::query_as::<_, Item>(
        "SELECT * FROM items WHERE external_channel_id = ? ORDER BY created_at ASC",
    )
    .bind(channel_id)
    .fetch_all(pool)
    .await?)
}

/// Distinct Teams channels any Item is bound to, so the Teams poller can
/// run one tick per channel instead of needing a channel list in
/// `Settings` (spec §4.7: "Items bound to the source channel").
pub async fn list_distinct_channel_ids(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT external_channel_id FROM items WHERE external_channel_id IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &SqlitePool,
    title: &str,
    description: &str,
    parent_id: Option<&str>,
    is_template: bool,
    inherit_context: bool,
    owner_id: &str,
    external_channel_id: Option<&str>,
    source_repo: Option<&str>,
) -> Result<Item> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    if let Some(parent) = parent_id {
        if would_parent_cycle(pool, &id, parent).await? {
            return Err(IdeaGraphError::domain_conflict(format!(
                "parent {parent} would create a cycle"
            )));
        }
    }

    sqlx::query(
        r#"
        INSERT INTO items (id, title, description, parent_id, is_template, inherit_context,
                            status, owner_id, external_channel_id, source_repo, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 'new', ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(title)
    .bind(description)
    .bind(parent_id)
    .bind(is_template)
    .bind(inherit_context)
    .bind(owner_id)
    .bind(external_channel_id)
    .bind(source_repo)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

/// Reparents an Item, rejecting the write at the boundary if it would
/// create a cycle (spec §3 invariant, §7 "Domain conflict").
pub async fn set_parent(pool: &SqlitePool, item_id: &str, new_parent: Option<&str>) -> Result<()> {
    if let Some(parent) = new_parent {
        if would_parent_cycle(pool, item_id, parent).await? {
            return Err(IdeaGraphError::domain_conflict(format!(
                "setting parent {parent} on {item_id} would create a cycle"
            )));
        }
    }

    sqlx::query("UPDATE items SET parent_id = ? WHERE id = ?")
        .bind(new_parent)
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_status(pool: &SqlitePool, item_id: &str, status: &str) -> Result<()> {
    let result = sqlx::query("UPDATE items SET status = ? WHERE id = ?")
        .bind(status)
        .bind(item_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(IdeaGraphError::NotFound(format!("item {item_id}")));
    }
    Ok(())
}

/// Returns the description+tags of the Item, unioned with the parent's
/// when `inherit_context` is set (spec §3 "effective context").
pub async fn effective_context(pool: &SqlitePool, item_id: &str) -> Result<String> {
    let item = get(pool, item_id).await?;
    let own_tags = super::tags::for_item(pool, item_id).await?;
    let mut context = format!(
        "{}\n\n{}\ntags: {}",
        item.title,
        item.description,
        own_tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    if item.inherit_context {
        if let Some(parent_id) = &item.parent_id {
            if let Ok(parent) = get(pool, parent_id).await {
                let parent_tags = super::tags::for_item(pool, parent_id).await.unwrap_or_default();
                context.push_str(&format!(
                    "\n\n[inherited from {}]\n{}\ntags: {}",
                    parent.title,
                    parent.description,
                    parent_tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
                ));
            }
        }
    }

    Ok(context)
}
