//! In-process stand-in for the external vector DB (spec §9 Non-goals:
//! "no custom vector index ... as a product feature" — this exists only
//! so single-node deployments and tests don't require a live cloud
//! endpoint). Brute-force cosine search over an in-memory map, adapted
//! from the workspace's original HNSW-shaped index, which itself only
//! ever did brute-force search despite the HNSW-shaped config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use super::embedding::{cosine_similarity, EmbeddingGenerator, EmbeddingModelType};
use super::{KnowledgeObject, SearchFilter, SearchHit, VectorIndexClient};
use crate::error::{IdeaGraphError, Result};

#[derive(Serialize, Deserialize, Clone)]
struct Entry {
    object: KnowledgeObject,
    vector: Vec<f32>,
}

/// Persisted snapshot format (bincode), mirroring the original index's
/// save/load pair.
#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    entries: HashMap<String, Entry>,
}

pub struct LocalVectorIndex {
    entries: RwLock<HashMap<String, Entry>>,
    embedder: EmbeddingGenerator,
    snapshot_path: Option<PathBuf>,
}

impl LocalVectorIndex {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            embedder: EmbeddingGenerator::new(EmbeddingModelType::default()),
            snapshot_path,
        }
    }

    /// Loads a prior snapshot from disk if one exists; a missing file is
    /// not an error (first run).
    pub fn load(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(path).map_err(|e| IdeaGraphError::Other(e.into()))?;
        let snapshot: Snapshot =
            bincode::deserialize(&bytes).map_err(|e| IdeaGraphError::Other(e.into()))?;
        *self.entries.write().unwrap() = snapshot.entries;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = Snapshot {
            entries: self.entries.read().unwrap().clone(),
        };
        let bytes = bincode::serialize(&snapshot).map_err(|e| IdeaGraphError::Other(e.into()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(path, bytes).map_err(|e| IdeaGraphError::Other(e.into()))?;
        Ok(())
    }

    fn keyword_score(query: &str, object: &KnowledgeObject) -> f32 {
        let query_terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if query_terms.is_empty() {
            return 0.0;
        }
        let haystack = format!("{} {}", object.title, object.description).to_lowercase();
        let hits = query_terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait::async_trait]
impl VectorIndexClient for LocalVectorIndex {
    async fn upsert(&self, object: KnowledgeObject) -> Result<()> {
        let text = format!("{} {}", object.title, object.description);
        let vector = self.embedder.embed(&text).await?;
        self.entries
            .write()
            .unwrap()
            .insert(object.id.clone(), Entry { object, vector });
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<KnowledgeObject>> {
        Ok(self.entries.read().unwrap().get(id).map(|e| e.object.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.entries.write().unwrap().remove(id);
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        alpha: f32,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query).await?;

        let mut hits: Vec<SearchHit> = {
            let entries = self.entries.read().unwrap();
            entries
                .values()
                .filter(|e| {
                    filter.kind.map(|k| k == e.object.kind).unwrap_or(true)
                        && filter
                            .item_id
                            .as_deref()
                            .map(|id| e.object.item_id.as_deref() == Some(id))
                            .unwrap_or(true)
                })
                .map(|e| {
                    let semantic = cosine_similarity(&query_vector, &e.vector);
                    let keyword = Self::keyword_score(query, &e.object);
                    let score = alpha * semantic + (1.0 - alpha) * keyword;
                    SearchHit {
                        id: e.object.id.clone(),
                        score,
                        properties: e.object.clone(),
                    }
                })
                .collect()
        };

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}
