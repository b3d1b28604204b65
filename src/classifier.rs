//! Decides whether an inbound message creates a Task, comments on an
//! existing one, or is ignored (spec §4.6).
//!
//! Short-ID resolution happens one layer up in the pollers — by the time
//! a message reaches [`Classifier::classify`] it has already failed to
//! resolve to an existing Task, so the classifier only ever returns
//! `Create` or `Ignore`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::agent_gateway::{AgentGateway, AgentInvocation, AgentName};
use crate::error::Result;
use crate::knowledge::{KnowledgeObjectType, KnowledgeSync, SearchFilter};

/// Candidate Item offered to the classifying agent, produced by a
/// suggestion-only RAG pre-query (spec §4.6, glossary "Item candidate").
#[derive(Debug, Clone, Serialize)]
pub struct ItemCandidate {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationKind {
    Create,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: ClassificationKind,
    pub item_id: Option<String>,
    pub task_title: Option<String>,
    pub task_description: Option<String>,
    pub reason: Option<String>,
}

impl Classification {
    fn ignore(reason: impl Into<String>) -> Self {
        Self {
            kind: ClassificationKind::Ignore,
            item_id: None,
            task_title: None,
            task_description: None,
            reason: Some(reason.into()),
        }
    }
}

/// Raw shape of the `message-classifier` agent's JSON result (spec §9
/// "the spec fixes it as `{kind, item_id?, task_title?, task_description?,
/// reason?}`").
#[derive(Debug, Deserialize)]
struct RawClassification {
    kind: String,
    item_id: Option<String>,
    task_title: Option<String>,
    task_description: Option<String>,
    reason: Option<String>,
}

pub struct Classifier<'a> {
    gateway: &'a dyn AgentGateway,
    knowledge: &'a KnowledgeSync,
    /// Fallback Item used when the agent returns `item_id: null` and no
    /// better candidate exists (spec §4.6).
    default_item_id: Option<String>,
}

impl<'a> Classifier<'a> {
    pub fn new(gateway: &'a dyn AgentGateway, knowledge: &'a KnowledgeSync, default_item_id: Option<String>) -> Self {
        Self {
            gateway,
            knowledge,
            default_item_id,
        }
    }

    /// Produces the top-5 Item candidates for `body` via a
    /// suggestion-only semantic search (spec §4.6).
    pub async fn suggest_items(&self, body: &str) -> Vec<ItemCandidate> {
        let filter = SearchFilter {
            kind: Some(KnowledgeObjectType::Item),
            item_id: None,
        };
        match self.knowledge.search(body, 0.6, 5, &filter).await {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| ItemCandidate {
                    id: hit.properties.id,
                    title: hit.properties.title,
                    description: hit.properties.description,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "item candidate search failed; classifying with an empty candidate list");
                Vec::new()
            }
        }
    }

    /// Calls the `message-classifier` agent with the message body,
    /// sender login, and Item candidates. Any agent error or malformed
    /// result degrades to `Ignore { reason: "classifier_error" }` rather
    /// than ever propagating out of a poller tick (spec §4.6).
    pub async fn classify(&self, body: &str, sender_login: &str, candidates: &[ItemCandidate]) -> Classification {
        let params = serde_json::json!({
            "sender": sender_login,
            "candidate_items": candidates,
        });
        let invocation = AgentInvocation::new(body).with_params(params);

        let response = match self.gateway.invoke(AgentName::MessageClassifier, invocation).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "message-classifier call failed");
                return Classification::ignore("classifier_error");
            }
        };

        Self::interpret(response.result, candidates, self.default_item_id.as_deref())
    }

    /// Pure interpretation of the agent's raw JSON result against the
    /// known candidate set; kept free of `self` borrows so it's testable
    /// without a live `KnowledgeSync`.
    fn interpret(raw: Value, candidates: &[ItemCandidate], default_item_id: Option<&str>) -> Classification {
        let parsed: RawClassification = match serde_json::from_value(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "message-classifier returned malformed JSON");
                return Classification::ignore("classifier_error");
            }
        };

        match parsed.kind.as_str() {
            "create" => {
                let item_id = parsed
                    .item_id
                    .filter(|id| candidates.iter().any(|c| &c.id == id) || default_item_id == Some(id.as_str()))
                    .or_else(|| default_item_id.map(str::to_string));

                match item_id {
                    Some(item_id) => Classification {
                        kind: ClassificationKind::Create,
                        item_id: Some(item_id),
                        task_title: parsed.task_title,
                        task_description: parsed.task_description,
                        reason: None,
                    },
                    None => Classification::ignore("no_suitable_item"),
                }
            }
            "ignore" => Classification::ignore(parsed.reason.unwrap_or_else(|| "unspecified".to_string())),
            other => {
                warn!(kind = other, "message-classifier returned an unrecognized kind");
                Classification::ignore("classifier_error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<ItemCandidate> {
        vec![ItemCandidate {
            id: "item-1".into(),
            title: "Auth".into(),
            description: "auth service".into(),
        }]
    }

    #[test]
    fn interprets_create_with_known_item() {
        let raw = serde_json::json!({"kind": "create", "item_id": "item-1", "task_title": "Fix login", "task_description": "desc"});
        let result = Classifier::interpret(raw, &candidates(), None);
        assert_eq!(result.kind, ClassificationKind::Create);
        assert_eq!(result.item_id.as_deref(), Some("item-1"));
    }

    #[test]
    fn falls_back_to_default_item_when_agent_item_unknown() {
        let raw = serde_json::json!({"kind": "create", "item_id": "not-a-candidate"});
        let result = Classifier::interpret(raw, &candidates(), Some("default-item"));
        assert_eq!(result.item_id.as_deref(), Some("default-item"));
    }

    #[test]
    fn ignores_when_no_suitable_item_and_no_default() {
        let raw = serde_json::json!({"kind": "create", "item_id": Value::Null});
        let result = Classifier::interpret(raw, &[], None);
        assert_eq!(result.kind, ClassificationKind::Ignore);
        assert_eq!(result.reason.as_deref(), Some("no_suitable_item"));
    }

    #[test]
    fn malformed_json_degrades_to_ignore() {
        let result = Classifier::interpret(serde_json::json!({"not_kind": true}), &[], None);
        assert_eq!(result.kind, ClassificationKind::Ignore);
        assert_eq!(result.reason.as_deref(), Some("classifier_error"));
    }
}
