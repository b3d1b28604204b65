//! Internal (RAG-over-own-knowledge) and external (web-search-backed)
//! advisory analysis for a Task description (spec §4.9). Neither mode
//! modifies the Task; both return markdown the caller attaches however
//! it sees fit (a TaskComment, an API response, ...).

use serde::Serialize;
use tracing::warn;

use crate::agent_gateway::{AgentGateway, AgentInvocation, AgentName};
use crate::error::{IdeaGraphError, Result};
use crate::knowledge::{KnowledgeSync, SearchFilter};
use crate::websearch::WebSearch;

#[derive(Debug, Clone, Serialize)]
pub struct SimilarObject {
    pub id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Advice {
    pub markdown: String,
}

pub struct SupportAdvisor<'a> {
    gateway: &'a dyn AgentGateway,
    knowledge: &'a KnowledgeSync,
    websearch: Option<&'a WebSearch>,
}

impl<'a> SupportAdvisor<'a> {
    pub fn new(gateway: &'a dyn AgentGateway, knowledge: &'a KnowledgeSync, websearch: Option<&'a WebSearch>) -> Self {
        Self {
            gateway,
            knowledge,
            websearch,
        }
    }

    /// Internal mode: searches `KnowledgeObject` for entries similar to
    /// `task_description` (top 5, any type), then asks
    /// `support-advisor-internal` to synthesize an analysis (spec §4.9).
    pub async fn internal(&self, task_description: &str) -> Result<Advice> {
        let hits = self
            .knowledge
            .search(task_description, 0.6, 5, &SearchFilter::default())
            .await
            .unwrap_or_default();

        let similar_objects: Vec<SimilarObject> = hits
            .into_iter()
            .map(|hit| SimilarObject {
                id: hit.id,
                title: hit.properties.title,
                snippet: hit.properties.description.chars().take(400).collect(),
            })
            .collect();

        let params = serde_json::json!({
            "task_description": task_description,
            "similar_objects": similar_objects,
        });
        let invocation = AgentInvocation::new(task_description).with_params(params);

        let response = self
            .gateway
            .invoke(AgentName::SupportAdvisorInternal, invocation)
            .await?;

        Ok(Advice {
            markdown: Self::extract_markdown(response.result),
        })
    }

    /// External mode: runs a web search (Google Programmable Search with
    /// Brave fallback), fetches 5 results, and asks
    /// `support-advisor-external` to synthesize an analysis with source
    /// citations. Fails with `FeatureDisabled("websearch")` if neither
    /// provider is configured (spec §4.9 `search_unconfigured`).
    pub async fn external(&self, task_description: &str) -> Result<Advice> {
        let websearch = self
            .websearch
            .ok_or_else(|| IdeaGraphError::feature_disabled("websearch"))?;

        let search_hits = websearch.search(task_description, 5).await?;

        let params = serde_json::json!({
            "task_description": task_description,
            "search_hits": search_hits,
        });
        let invocation = AgentInvocation::new(task_description).with_params(params);

        let response = self
            .gateway
            .invoke(AgentName::SupportAdvisorExternal, invocation)
            .await?;

        Ok(Advice {
            markdown: Self::extract_markdown(response.result),
        })
    }

    fn extract_markdown(raw: serde_json::Value) -> String {
        if let Some(s) = raw.as_str() {
            return s.to_string();
        }
        raw.get("markdown")
            .or_else(|| raw.get("analysis"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                warn!("support advisor agent result had no markdown/analysis field; stringifying raw JSON");
                raw.to_string()
            })
    }
}
