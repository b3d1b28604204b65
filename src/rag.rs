//! Retrieval-augmented question answering (spec §4.8): expand → retrieve
//! semantically → retrieve by keyword → fuse & rerank → assemble tiered
//! context → answer with citations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::agent_gateway::{AgentGateway, AgentInvocation, AgentName};
use crate::knowledge::{KnowledgeObjectType, KnowledgeSync, SearchFilter, SearchHit};

const SEMANTIC_ALPHA: f32 = 0.6;
const KEYWORD_ALPHA: f32 = 0.7;
const SEMANTIC_LIMIT: usize = 24;
const KEYWORD_LIMIT: usize = 20;
const FUSED_TOP_N: usize = 6;
const CONTEXT_CHAR_BUDGET: usize = 2400;
const SNIPPET_MAX_CHARS: usize = 400;

/// Parsed `question-optimization` agent result (spec §4.8 stage 1).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExpandedQuery {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub core: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ban: Vec<String>,
    #[serde(default)]
    pub followup_questions: Vec<String>,
}

/// One scored, deduped candidate carried from fusion through tiering.
#[derive(Debug, Clone)]
struct FusedCandidate {
    hit: SearchHit,
    final_score: f32,
}

/// One labeled context section (`#A1`, `#B2`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct ContextSection {
    pub label: String,
    pub id: String,
    pub title: String,
    pub kind: KnowledgeObjectType,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub context: String,
    pub sources: Vec<ContextSection>,
}

pub struct RagPipeline<'a> {
    gateway: &'a dyn AgentGateway,
    knowledge: &'a KnowledgeSync,
}

impl<'a> RagPipeline<'a> {
    pub fn new(gateway: &'a dyn AgentGateway, knowledge: &'a KnowledgeSync) -> Self {
        Self { gateway, knowledge }
    }

    /// Runs the full pipeline for `question`, optionally scoped to
    /// `item_id` for tiering purposes (spec §4.8 end-to-end).
    pub async fn answer(&self, question: &str, item_id: Option<&str>) -> RagAnswer {
        let expanded = self.expand(question).await;

        let semantic_query = Self::semantic_query_string(&expanded);
        let keyword_query = Self::keyword_query_string(&expanded);

        let results_sem = self
            .knowledge
            .search(&semantic_query, SEMANTIC_ALPHA, SEMANTIC_LIMIT, &SearchFilter::default())
            .await
            .unwrap_or_default();
        let results_kw = self
            .knowledge
            .search(&keyword_query, KEYWORD_ALPHA, KEYWORD_LIMIT, &SearchFilter::default())
            .await
            .unwrap_or_default();

        let fused = Self::fuse(results_sem, results_kw, &expanded.tags, item_id);

        if fused.is_empty() {
            return RagAnswer {
                answer: "I don't have any indexed knowledge matching that question yet.".to_string(),
                context: String::new(),
                sources: Vec::new(),
            };
        }

        let (context, sources) = Self::assemble_context(&fused, item_id);
        let answer = self.generate_answer(question, &context).await;

        RagAnswer { answer, context, sources }
    }

    /// Calls `question-optimization`; any error or malformed result
    /// falls back to `{core: original_question}` with empty expansions
    /// (spec §4.8 stage 1).
    async fn expand(&self, question: &str) -> ExpandedQuery {
        let invocation = AgentInvocation::new(question);
        match self.gateway.invoke(AgentName::QuestionOptimization, invocation).await {
            Ok(response) => serde_json::from_value(response.result).unwrap_or_else(|e| {
                warn!(error = %e, "question-optimization returned malformed JSON; using the raw question");
                Self::fallback_expansion(question)
            }),
            Err(e) => {
                warn!(error = %e, "question-optimization call failed; using the raw question");
                Self::fallback_expansion(question)
            }
        }
    }

    fn fallback_expansion(question: &str) -> ExpandedQuery {
        ExpandedQuery {
            core: question.to_string(),
            ..Default::default()
        }
    }

    fn semantic_query_string(expanded: &ExpandedQuery) -> String {
        let mut parts = vec![expanded.core.clone()];
        parts.extend(expanded.synonyms.iter().take(3).cloned());
        parts.extend(expanded.phrases.iter().take(2).cloned());
        parts.extend(expanded.tags.iter().take(2).cloned());
        parts.join(" ")
    }

    fn keyword_query_string(expanded: &ExpandedQuery) -> String {
        format!("{} {}", expanded.tags.join(" "), expanded.core)
    }

    /// Dedupes by id and computes `final = 0.6*sem + 0.2*bm25 +
    /// 0.15*tag_match + 0.05*same_item` (spec §4.8 stage 4). Missing
    /// component scores are treated as 0.
    fn fuse(
        results_sem: Vec<SearchHit>,
        results_kw: Vec<SearchHit>,
        expanded_tags: &[String],
        item_id: Option<&str>,
    ) -> Vec<FusedCandidate> {
        use std::collections::HashMap;

        let mut sem_scores: HashMap<String, f32> = HashMap::new();
        let mut bm25_scores: HashMap<String, f32> = HashMap::new();
        let mut by_id: HashMap<String, SearchHit> = HashMap::new();

        for hit in results_sem {
            sem_scores.insert(hit.id.clone(), hit.score);
            by_id.insert(hit.id.clone(), hit);
        }
        for hit in results_kw {
            bm25_scores.insert(hit.id.clone(), hit.score);
            by_id.entry(hit.id.clone()).or_insert(hit);
        }

        let mut fused: Vec<FusedCandidate> = by_id
            .into_values()
            .map(|hit| {
                let sem = *sem_scores.get(&hit.id).unwrap_or(&0.0);
                let bm25 = *bm25_scores.get(&hit.id).unwrap_or(&0.0);
                let tag_match = if expanded_tags.iter().any(|t| hit.properties.tags.contains(t)) {
                    1.0
                } else {
                    0.0
                };
                let same_item = if item_id.is_some() && hit.properties.item_id.as_deref() == item_id {
                    1.0
                } else {
                    0.0
                };
                let final_score = 0.6 * sem + 0.2 * bm25 + 0.15 * tag_match + 0.05 * same_item;
                FusedCandidate { hit, final_score }
            })
            .collect();

        // Ties broken in favor of same-item candidates (spec §8 "RAG fusion").
        fused.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_same = item_id.is_some() && a.hit.properties.item_id.as_deref() == item_id;
                    let b_same = item_id.is_some() && b.hit.properties.item_id.as_deref() == item_id;
                    b_same.cmp(&a_same)
                })
        });
        fused.truncate(FUSED_TOP_N);
        fused
    }

    /// Splits the fused top-6 into Tier A/B (same item) and Tier C
    /// (elsewhere), serializes the `CONTEXT:` block, and truncates the
    /// longest snippets first to respect the ~2400-char budget (spec
    /// §4.8 stage 5, §8 "RAG context size").
    fn assemble_context(fused: &[FusedCandidate], item_id: Option<&str>) -> (String, Vec<ContextSection>) {
        let (same_item, other_item): (Vec<&FusedCandidate>, Vec<&FusedCandidate>) = fused
            .iter()
            .partition(|c| item_id.is_some() && c.hit.properties.item_id.as_deref() == item_id);

        let tier_a = same_item.iter().take(3).cloned().collect::<Vec<_>>();
        let tier_b = same_item.iter().skip(3).take(3).cloned().collect::<Vec<_>>();
        let tier_c = other_item.iter().take(2).cloned().collect::<Vec<_>>();

        let mut entries: Vec<(String, &FusedCandidate)> = Vec::new();
        for (n, c) in tier_a.iter().enumerate() {
            entries.push((format!("A{}", n + 1), c));
        }
        for (n, c) in tier_b.iter().enumerate() {
            entries.push((format!("B{}", n + 1), c));
        }
        for (n, c) in tier_c.iter().enumerate() {
            entries.push((format!("C{}", n + 1), c));
        }

        let mut snippets: Vec<String> = entries
            .iter()
            .map(|(label, c)| {
                let snippet: String = c.hit.properties.description.chars().take(SNIPPET_MAX_CHARS).collect();
                format!("[#{label}] {} — {snippet}", c.hit.properties.title)
            })
            .collect();

        Self::truncate_to_budget(&mut snippets);

        let mut context = String::from("CONTEXT:\n");
        context.push_str(&snippets.join("\n"));

        let sources = entries
            .into_iter()
            .map(|(label, c)| ContextSection {
                label,
                id: c.hit.id.clone(),
                title: c.hit.properties.title.clone(),
                kind: c.hit.properties.kind,
                score: c.final_score,
            })
            .collect();

        (context, sources)
    }

    /// Shrinks the longest lines first until the joined text fits the
    /// budget, never dropping a line entirely.
    fn truncate_to_budget(snippets: &mut [String]) {
        loop {
            let total: usize = snippets.iter().map(|s| s.len()).sum::<usize>() + snippets.len().saturating_sub(1);
            if total <= CONTEXT_CHAR_BUDGET {
                return;
            }
            let Some((idx, _)) = snippets
                .iter()
                .enumerate()
                .max_by_key(|(_, s)| s.len())
                .filter(|(_, s)| s.len() > 40)
            else {
                return;
            };
            let s = &mut snippets[idx];
            let new_len = (s.len() * 9 / 10).max(40);
            *s = s.chars().take(new_len).collect();
        }
    }

    /// Calls `question-answering`; a failure still returns a usable
    /// (if generic) answer rather than propagating (spec §4.8 stage 6).
    async fn generate_answer(&self, question: &str, context: &str) -> String {
        let params = serde_json::json!({ "question": question, "context": context });
        let invocation = AgentInvocation::new(question).with_params(params);

        match self.gateway.invoke(AgentName::QuestionAnswering, invocation).await {
            Ok(response) => Self::extract_answer_text(response.result),
            Err(e) => {
                warn!(error = %e, "question-answering call failed");
                "I found relevant context but couldn't generate an answer right now.".to_string()
            }
        }
    }

    fn extract_answer_text(raw: Value) -> String {
        if let Some(s) = raw.as_str() {
            return s.to_string();
        }
        raw.get("answer")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeObject;

    fn hit(id: &str, score: f32, item_id: Option<&str>, tags: &[&str]) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            score,
            properties: KnowledgeObject {
                id: id.to_string(),
                kind: KnowledgeObjectType::Item,
                title: format!("title-{id}"),
                description: "x".repeat(500),
                status: String::new(),
                owner: String::new(),
                item_id: item_id.map(str::to_string),
                task_id: None,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                url: String::new(),
                github_issue_id: None,
                created_at: 0,
            },
        }
    }

    #[test]
    fn fusion_prefers_same_item_on_tie() {
        let sem = vec![hit("a", 0.8, Some("other"), &[]), hit("b", 0.8, Some("mine"), &[])];
        let fused = RagPipeline::fuse(sem, Vec::new(), &[], Some("mine"));
        assert_eq!(fused[0].hit.id, "b");
    }

    #[test]
    fn context_assembly_respects_char_budget() {
        let candidates: Vec<FusedCandidate> = (0..6)
            .map(|i| FusedCandidate {
                hit: hit(&format!("k{i}"), 1.0, Some("mine"), &[]),
                final_score: 1.0 - (i as f32) * 0.01,
            })
            .collect();
        let (context, sources) = RagPipeline::assemble_context(&candidates, Some("mine"));
        assert!(context.len() <= CONTEXT_CHAR_BUDGET + 16);
        assert!(!sources.is_empty());
    }

    #[test]
    fn empty_fusion_yields_no_context() {
        let (context, sources) = RagPipeline::assemble_context(&[], None);
        assert_eq!(context, "CONTEXT:\n");
        assert!(sources.is_empty());
    }
}
