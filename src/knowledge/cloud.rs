//! HTTP-backed [`VectorIndexClient`] for `vectorindex.mode = cloud` (spec
//! §6: "the core assumes hybrid search returning `{id, score,
//! properties}` given `(query, alpha, limit, filter)`"). Talks to an
//! external vector DB exposing upsert/fetch/delete/search over REST;
//! the concrete product is out of scope, only the contract is specified.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{KnowledgeObject, KnowledgeObjectType, SearchFilter, SearchHit};
use crate::error::{IdeaGraphError, Result};

pub struct CloudVectorIndex {
    client: Client,
    base_url: String,
    collection: &'static str,
}

impl CloudVectorIndex {
    pub fn new(base_url: impl Into<String>, api_key: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(10));
        if let Some(key) = api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| IdeaGraphError::Other(e.into()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|e| IdeaGraphError::transient("vectorindex", e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            collection: "KnowledgeObject",
        })
    }

    fn translate(&self, status: StatusCode, body: String) -> IdeaGraphError {
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            IdeaGraphError::transient("vectorindex", format!("{status}: {body}"))
        } else {
            IdeaGraphError::permanent("vectorindex", "vector index rejected the request")
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    collection: &'a str,
    query: &'a str,
    alpha: f32,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_item_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

#[async_trait::async_trait]
impl super::VectorIndexClient for CloudVectorIndex {
    async fn upsert(&self, object: KnowledgeObject) -> Result<()> {
        let url = format!("{}/collections/{}/points", self.base_url, self.collection);
        let response = self
            .client
            .put(&url)
            .json(&object)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("vectorindex", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate(status, body));
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<KnowledgeObject>> {
        let url = format!(
            "{}/collections/{}/points/{}",
            self.base_url, self.collection, id
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("vectorindex", e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate(status, body));
        }
        Ok(Some(
            response
                .json()
                .await
                .map_err(|e| IdeaGraphError::transient("vectorindex", e.to_string()))?,
        ))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = format!(
            "{}/collections/{}/points/{}",
            self.base_url, self.collection, id
        );
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("vectorindex", e.to_string()))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate(status, body));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        alpha: f32,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let url = format!("{}/collections/{}/search", self.base_url, self.collection);
        let request = SearchRequest {
            collection: self.collection,
            query,
            alpha,
            limit,
            filter_type: filter.kind.map(KnowledgeObjectType::as_str),
            filter_item_id: filter.item_id.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("vectorindex", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate(status, body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::transient("vectorindex", e.to_string()))?;
        Ok(parsed.hits)
    }
}
