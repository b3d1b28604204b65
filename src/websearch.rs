//! External web-search adapter backing `SupportAdvisor`'s external mode
//! (spec §4.9, §6 `websearch.*` settings): Google Programmable Search
//! with Brave as a fallback when Google is unconfigured or errors.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::WebSearchSettings;
use crate::error::{IdeaGraphError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct WebSearch {
    client: Client,
    settings: WebSearchSettings,
}

impl WebSearch {
    /// Returns `None` when neither provider is configured, matching the
    /// `agent_gateway`/`cache` pattern of an `Option<Self>` constructor
    /// so callers short-circuit with `feature_disabled` at the edge
    /// rather than inside every call site.
    pub fn new(settings: &WebSearchSettings) -> Result<Option<Self>> {
        if !settings.any_enabled() {
            return Ok(None);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdeaGraphError::transient("websearch", e.to_string()))?;
        Ok(Some(Self {
            client,
            settings: settings.clone(),
        }))
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if self.settings.google_enabled {
            match self.search_google(query, limit).await {
                Ok(hits) => return Ok(hits),
                Err(e) => {
                    tracing::warn!(error = %e, "google search failed; falling back to Brave");
                }
            }
        }

        if self.settings.brave_key.is_some() {
            return self.search_brave(query, limit).await;
        }

        Err(IdeaGraphError::feature_disabled("websearch"))
    }

    async fn search_google(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let key = self
            .settings
            .google_key
            .as_deref()
            .ok_or_else(|| IdeaGraphError::feature_disabled("websearch.google"))?;
        let cx = self
            .settings
            .google_cx
            .as_deref()
            .ok_or_else(|| IdeaGraphError::feature_disabled("websearch.google"))?;

        #[derive(Deserialize)]
        struct GoogleResponse {
            #[serde(default)]
            items: Vec<GoogleItem>,
        }
        #[derive(Deserialize)]
        struct GoogleItem {
            title: String,
            link: String,
            #[serde(default)]
            snippet: String,
        }

        let url = "https://www.googleapis.com/customsearch/v1";
        let response = self
            .client
            .get(url)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", &limit.min(10).to_string())])
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("websearch.google", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdeaGraphError::transient("websearch.google", format!("status {status}")));
        }

        let parsed: GoogleResponse = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::transient("websearch.google", e.to_string()))?;

        Ok(parsed
            .items
            .into_iter()
            .take(limit)
            .map(|i| SearchHit {
                title: i.title,
                url: i.link,
                snippet: i.snippet,
            })
            .collect())
    }

    async fn search_brave(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let key = self
            .settings
            .brave_key
            .as_deref()
            .ok_or_else(|| IdeaGraphError::feature_disabled("websearch.brave"))?;

        #[derive(Deserialize)]
        struct BraveResponse {
            web: Option<BraveWeb>,
        }
        #[derive(Deserialize)]
        struct BraveWeb {
            #[serde(default)]
            results: Vec<BraveResult>,
        }
        #[derive(Deserialize)]
        struct BraveResult {
            title: String,
            url: String,
            #[serde(default)]
            description: String,
        }

        let url = "https://api.search.brave.com/res/v1/web/search";
        let response = self
            .client
            .get(url)
            .header("X-Subscription-Token", key)
            .query(&[("q", query), ("count", &limit.min(20).to_string())])
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("websearch.brave", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdeaGraphError::transient("websearch.brave", format!("status {status}")));
        }

        let parsed: BraveResponse = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::transient("websearch.brave", e.to_string()))?;

        Ok(parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.description,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_settings_yield_no_client() {
        let settings = WebSearchSettings::default();
        let search = WebSearch::new(&settings).unwrap();
        assert!(search.is_none());
    }

    #[test]
    fn google_only_is_configured() {
        let settings = WebSearchSettings {
            google_enabled: true,
            google_key: Some("k".into()),
            google_cx: Some("cx".into()),
            brave_key: None,
        };
        assert!(WebSearch::new(&settings).unwrap().is_some());
    }
}
