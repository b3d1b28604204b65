//! # IdeaGraph
//!
//! Turns unstructured mail, Teams chat, and GitHub issue traffic into a
//! queryable knowledge graph of `Item`/`Task`/`TaskComment` records, with
//! a retrieval-augmented question-answering surface over the same
//! corpus.
//!
//! ## Pipeline
//!
//! - Inbound messages are resolved to a [`Principal`](identity::Principal)
//!   by [`identity::IdentityResolver`], classified by
//!   [`classifier::Classifier`], and routed into the domain store
//!   ([`db`]) by the relevant [`pollers`] implementation.
//! - Every domain write fans out to [`knowledge::KnowledgeSync`], which
//!   keeps the vector index ([`knowledge::VectorIndexClient`]) in sync on
//!   a best-effort basis.
//! - [`rag`] answers natural-language questions against the same index;
//!   [`support_advisor`] answers support-style questions with an optional
//!   web search fallback; [`task_mover`] relocates a task's document
//!   library folder when its parent `Item` changes.
//! - [`orchestrator::Orchestrator`] supervises the pollers; [`api`]
//!   exposes the thin HTTP surface; [`cli`] exposes the operator surface.

pub mod agent_gateway;
pub mod api;
pub mod cache;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod content_extractor;
pub mod db;
pub mod domain;
pub mod error;
pub mod external;
pub mod file_ingestion;
pub mod identity;
pub mod knowledge;
pub mod log_analysis;
pub mod metrics;
pub mod orchestrator;
pub mod pollers;
pub mod rag;
pub mod support_advisor;
pub mod task_mover;
pub mod telemetry;
pub mod thread_token;
pub mod webhooks;
pub mod websearch;

pub use agent_gateway::{AgentGateway, AgentInvocation, AgentName, HttpAgentGateway};
pub use classifier::{Classification, ClassificationKind, Classifier};
pub use config::{BootstrapConfig, Settings, SettingsStore};
pub use error::{IdeaGraphError, Result};
pub use identity::{IdentityResolver, Principal};
pub use knowledge::{KnowledgeObjectType, KnowledgeSync, VectorIndexClient};
pub use orchestrator::Orchestrator;
pub use rag::RagPipeline;
pub use support_advisor::SupportAdvisor;
pub use task_mover::TaskMover;
pub use thread_token::ThreadTokenCodec;
