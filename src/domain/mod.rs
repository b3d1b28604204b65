//! Domain entities (spec §3).
//!
//! Every "dynamic enum-like string" the source system used (task status,
//! comment source/direction, auth kind, ...) is a closed tagged variant
//! here, not a free string, per spec §9. Each variant serializes to the
//! canonical lowercase wire form via `#[serde(rename_all = "snake_case")]`
//! so storage and the `KnowledgeObject` payload agree on spelling.

mod item;
mod item_file;
mod milestone;
mod question_answer;
mod tag;
mod task;
mod task_comment;
mod user;

pub use item::{would_create_cycle, Item, ParentLookup, MAX_PARENT_DEPTH};
pub use item_file::ItemFile;
pub use milestone::{Milestone, MilestoneContextKind, MilestoneContextObject, ProposedTask};
pub use question_answer::{QaSource, QaSourceRef, QuestionAnswer};
pub use tag::{normalize_tag_name, Tag};
pub use task::{Task, TaskStatus};
pub use task_comment::{CommentDirection, CommentSource, TaskComment};
pub use user::{AuthKind, User};
