//! Shared cursor / fetch / self-filter / enrich / route contract the
//! three source pollers implement independently (spec §4.7).
//!
//! Each poller owns its own cursor row in `poller_cursors` (keyed by
//! source name) and its own poisoned-message sidecar entries in
//! `poisoned_messages`, both via [`crate::db::pollers`]. A tick never
//! advances its cursor past the first message whose side effects fail
//! and aren't yet poisoned, so the next tick retries it; a message that
//! crosses the poison threshold mid-tick is treated as handled so it
//! doesn't block the cursor forever.

pub mod github;
pub mod mail;
pub mod teams;

pub use github::GitHubPoller;
pub use mail::MailPoller;
pub use teams::TeamsPoller;

/// Events fetched and processed per tick (spec §4.7 "bounded, max 25
/// per tick").
pub const MAX_PER_TICK: usize = 25;

/// `message-id`/`internet_message_id` prefix marking a message IdeaGraph
/// itself sent, so a poller never reprocesses its own confirmation as
/// inbound traffic (spec §4.7 "auto-generated confirmation from the
/// core itself").
pub const OUTBOUND_MESSAGE_ID_PREFIX: &str = "ideagraph-outbound-";
