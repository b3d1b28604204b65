//! Local embedding generation for the `local` [`VectorIndexClient`] mode.
//! Adapted near-verbatim from the workspace's original `fastembed`
//! wrapper; generalized only to drop the RAG-specific doc comments.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{IdeaGraphError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingModelType {
    BGESmallENV15,
    BGEBaseENV15,
    AllMiniLML6V2,
}

impl EmbeddingModelType {
    pub fn to_fastembed_model(self) -> EmbeddingModel {
        match self {
            Self::BGESmallENV15 => EmbeddingModel::BGESmallENV15,
            Self::BGEBaseENV15 => EmbeddingModel::BGEBaseENV15,
            Self::AllMiniLML6V2 => EmbeddingModel::AllMiniLML6V2,
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            Self::BGESmallENV15 => 384,
            Self::BGEBaseENV15 => 768,
            Self::AllMiniLML6V2 => 384,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BGESmallENV15 => "BGE-small-en-v1.5",
            Self::BGEBaseENV15 => "BGE-base-en-v1.5",
            Self::AllMiniLML6V2 => "all-MiniLM-L6-v2",
        }
    }
}

impl Default for EmbeddingModelType {
    fn default() -> Self {
        Self::BGESmallENV15
    }
}

/// Lazily loads the fastembed model behind a double-checked `RwLock` so
/// concurrent pollers/handlers don't each trigger a download/load.
pub struct EmbeddingGenerator {
    model_type: EmbeddingModelType,
    model: Arc<RwLock<Option<TextEmbedding>>>,
}

impl EmbeddingGenerator {
    pub fn new(model_type: EmbeddingModelType) -> Self {
        Self {
            model_type,
            model: Arc::new(RwLock::new(None)),
        }
    }

    pub fn dimension(&self) -> usize {
        self.model_type.dimension()
    }

    async fn ensure_model_loaded(&self) -> Result<()> {
        {
            let guard = self.model.read().await;
            if guard.is_some() {
                return Ok(());
            }
        }

        let mut guard = self.model.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let init_options = InitOptions::new(self.model_type.to_fastembed_model())
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| IdeaGraphError::Other(anyhow::anyhow!(e)))?;

        tracing::info!(model = self.model_type.name(), "embedding model loaded");
        *guard = Some(model);
        Ok(())
    }

    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_model_loaded().await?;

        let mut guard = self.model.write().await;
        let model = guard
            .as_mut()
            .ok_or_else(|| IdeaGraphError::Other(anyhow::anyhow!("embedding model not initialized")))?;

        let owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        model
            .embed(owned, None)
            .map_err(|e| IdeaGraphError::Other(anyhow::anyhow!(e)))
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch
            .pop()
            .ok_or_else(|| IdeaGraphError::Other(anyhow::anyhow!("no embedding produced")))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
