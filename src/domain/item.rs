use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;

/// A project/feature/container. May form a hierarchy via `parent_id`.
/// `effective_context` (title+description+tags, unioned with the parent's
/// when `inherit_context` is set) is computed by [`KnowledgeSync`], not
/// stored — it's a view over the Item, not new state.
///
/// [`KnowledgeSync`]: crate::knowledge::sync::KnowledgeSync
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub is_template: bool,
    pub inherit_context: bool,
    pub status: String,
    pub owner_id: String,
    pub external_channel_id: Option<String>,
    pub source_repo: Option<String>,
    pub created_at: i64,
}

/// Maximum depth walked while checking for a cycle (spec §9: "bounded
/// depth ≤ 10"). A legitimate Item hierarchy is never this deep; hitting
/// the bound is itself treated as a cycle.
pub const MAX_PARENT_DEPTH: usize = 10;

/// An ancestor-chain accessor the cycle detector walks. `db::items`
/// implements this against the pool; tests implement it against a
/// `HashMap` so the detector is exercised without a database.
pub trait ParentLookup {
    fn parent_of(&self, item_id: &str) -> Option<String>;
}

/// Would attaching `candidate_parent` as the parent of `item_id` create a
/// cycle, or exceed [`MAX_PARENT_DEPTH`]? Walk up from `candidate_parent`;
/// if we ever see `item_id` again, or run out of depth budget, reject.
pub fn would_create_cycle(
    lookup: &impl ParentLookup,
    item_id: &str,
    candidate_parent: &str,
) -> bool {
    if item_id == candidate_parent {
        return true;
    }

    let mut seen = HashSet::new();
    let mut current = candidate_parent.to_string();

    for _ in 0..MAX_PARENT_DEPTH {
        if current == item_id {
            return true;
        }
        if !seen.insert(current.clone()) {
            return true; // pre-existing cycle in stored data
        }
        match lookup.parent_of(&current) {
            Some(next) => current = next,
            None => return false,
        }
    }

    // Depth budget exhausted without reaching a root: treat as a cycle.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapLookup(HashMap<String, String>);
    impl ParentLookup for MapLookup {
        fn parent_of(&self, item_id: &str) -> Option<String> {
            self.0.get(item_id).cloned()
        }
    }

    #[test]
    fn detects_direct_cycle() {
        let lookup = MapLookup(HashMap::new());
        assert!(would_create_cycle(&lookup, "a", "a"));
    }

    #[test]
    fn detects_indirect_cycle() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), "a".to_string());
        let lookup = MapLookup(map);
        // making a's parent b would cycle back to a via b -> a
        assert!(would_create_cycle(&lookup, "a", "b"));
    }

    #[test]
    fn allows_simple_chain() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), "c".to_string());
        let lookup = MapLookup(map);
        assert!(!would_create_cycle(&lookup, "a", "b"));
    }
}
