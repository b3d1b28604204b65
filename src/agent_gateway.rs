//! HTTP client for the LLM-backed agents the pipeline calls by name:
//! classification, question optimization/answering, the two support
//! advisor modes, summarization, task derivation, markdown conversion,
//! summary enhancement, and Teams support analysis. Every call goes
//! through a single `POST {base_url}/agents/{name}/invoke`; callers get
//! back the raw JSON result plus token/model accounting so
//! `metrics::track_agent_call` can record latency and cost per agent.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::AgentSettings;
use crate::error::{IdeaGraphError, Result};

/// The closed set of agents the pipeline is allowed to call. Any other
/// name is a programming error, not a runtime condition, so callers
/// select one of these variants rather than passing a bare string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentName {
    MessageClassifier,
    QuestionOptimization,
    QuestionAnswering,
    SupportAdvisorInternal,
    SupportAdvisorExternal,
    TextSummary,
    TextAnalysisTaskDerivation,
    MarkdownToHtmlConverter,
    SummaryEnhancer,
    TeamsSupportAnalysis,
}

impl AgentName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageClassifier => "message-classifier",
            Self::QuestionOptimization => "question-optimization",
            Self::QuestionAnswering => "question-answering",
            Self::SupportAdvisorInternal => "support-advisor-internal",
            Self::SupportAdvisorExternal => "support-advisor-external",
            Self::TextSummary => "text-summary",
            Self::TextAnalysisTaskDerivation => "text-analysis-task-derivation",
            Self::MarkdownToHtmlConverter => "markdown-to-html-converter",
            Self::SummaryEnhancer => "summary-enhancer",
            Self::TeamsSupportAnalysis => "teams-support-analysis",
        }
    }

    pub const ALL: [AgentName; 10] = [
        Self::MessageClassifier,
        Self::QuestionOptimization,
        Self::QuestionAnswering,
        Self::SupportAdvisorInternal,
        Self::SupportAdvisorExternal,
        Self::TextSummary,
        Self::TextAnalysisTaskDerivation,
        Self::MarkdownToHtmlConverter,
        Self::SummaryEnhancer,
        Self::TeamsSupportAnalysis,
    ];
}

/// One call to an agent: free-text prompt plus a structured parameter
/// bag the agent's own schema interprets (e.g. `{"candidate_items": [...]}`
/// for the classifier).
#[derive(Debug, Clone, Serialize)]
pub struct AgentInvocation {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl AgentInvocation {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentResponse {
    pub result: Value,
    #[serde(default)]
    pub tokens: u32,
    #[serde(default)]
    pub model: String,
}

#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn invoke(&self, agent: AgentName, invocation: AgentInvocation) -> Result<AgentResponse>;

    async fn list_agents(&self) -> Result<Vec<String>>;
}

/// Production [`AgentGateway`]: one `reqwest::Client`, bearer-token
/// authenticated, pointed at the agent host from `Settings.agent`.
pub struct HttpAgentGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAgentGateway {
    pub fn new(settings: &AgentSettings) -> Result<Option<Self>> {
        if !settings.enabled {
            return Ok(None);
        }
        let base_url = settings
            .base_url
            .clone()
            .ok_or_else(|| IdeaGraphError::permanent("agent_gateway", "agent.base_url is required when agent.enabled is true"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| IdeaGraphError::transient("agent_gateway", e.to_string()))?;

        Ok(Some(Self {
            client,
            base_url,
            token: settings.token.clone(),
        }))
    }

    fn translate_status(&self, status: StatusCode, body: String) -> IdeaGraphError {
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
            IdeaGraphError::transient("agent_gateway", format!("{status}: {body}"))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            IdeaGraphError::permanent("agent_gateway", "agent gateway authentication failed")
        } else {
            IdeaGraphError::malformed_agent_output(format!("agent gateway rejected the request: {status}: {body}"))
        }
    }

    async fn invoke_inner(&self, agent: AgentName, invocation: AgentInvocation) -> Result<AgentResponse> {
        let url = format!("{}/agents/{}/invoke", self.base_url.trim_end_matches('/'), agent.as_str());

        let mut request = self.client.post(&url).json(&invocation);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("agent_gateway", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate_status(status, body));
        }

        response
            .json::<AgentResponse>()
            .await
            .map_err(|e| IdeaGraphError::malformed_agent_output(format!("agent response was not valid JSON: {e}")))
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn invoke(&self, agent: AgentName, invocation: AgentInvocation) -> Result<AgentResponse> {
        let started = std::time::Instant::now();
        let result = self.invoke_inner(agent, invocation).await;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        crate::metrics::track_agent_call(agent.as_str(), elapsed_ms, result.is_ok()).await;

        result
    }

    async fn list_agents(&self) -> Result<Vec<String>> {
        let url = format!("{}/agents", self.base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("agent_gateway", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate_status(status, body));
        }

        #[derive(Deserialize)]
        struct ListAgentsResponse {
            agents: Vec<String>,
        }
        let parsed: ListAgentsResponse = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::malformed_agent_output(format!("agent list response was not valid JSON: {e}")))?;
        Ok(parsed.agents)
    }
}

/// Stands in for [`HttpAgentGateway`] when `agent.enabled` is false, so
/// callers always hold an `Arc<dyn AgentGateway>` rather than threading an
/// `Option` through every call site. Every call fails fast with
/// `FeatureDisabled` instead of reaching the network.
pub struct DisabledAgentGateway;

#[async_trait]
impl AgentGateway for DisabledAgentGateway {
    async fn invoke(&self, _agent: AgentName, _invocation: AgentInvocation) -> Result<AgentResponse> {
        Err(IdeaGraphError::feature_disabled("agent"))
    }

    async fn list_agents(&self) -> Result<Vec<String>> {
        Err(IdeaGraphError::feature_disabled("agent"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_names_serialize_kebab_case() {
        assert_eq!(AgentName::MessageClassifier.as_str(), "message-classifier");
        assert_eq!(AgentName::SupportAdvisorExternal.as_str(), "support-advisor-external");
        assert_eq!(AgentName::TeamsSupportAnalysis.as_str(), "teams-support-analysis");
    }

    #[test]
    fn all_covers_every_variant() {
        assert_eq!(AgentName::ALL.len(), 10);
    }

    #[tokio::test]
    async fn disabled_gateway_fails_fast_without_network() {
        let gateway = DisabledAgentGateway;
        let err = gateway
            .invoke(AgentName::QuestionAnswering, AgentInvocation::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdeaGraphError::FeatureDisabled { .. }));
        assert!(gateway.list_agents().await.is_err());
    }

    #[test]
    fn disabled_settings_yield_no_gateway() {
        let settings = AgentSettings {
            enabled: false,
            base_url: None,
            token: None,
            max_tokens: 2048,
        };
        let gateway = HttpAgentGateway::new(&settings).unwrap();
        assert!(gateway.is_none());
    }

    #[test]
    fn enabled_without_base_url_is_a_config_error() {
        let settings = AgentSettings {
            enabled: true,
            base_url: None,
            token: None,
            max_tokens: 2048,
        };
        assert!(HttpAgentGateway::new(&settings).is_err());
    }
}
