//! Mail poller (spec §4.7): polls a single mailbox/folder, routes each
//! message to an existing Task via its Short-ID or creates a new one
//! via the [`Classifier`].

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::classifier::{Classification, ClassificationKind, Classifier};
use crate::config::MailSettings;
use crate::db::{pollers as poller_db, task_comments, tasks, users};
use crate::domain::{CommentDirection, CommentSource};
use crate::error::{IdeaGraphError, PartialFailureReport, Result};
use crate::external::graph::{GraphClient, MailMessage};
use crate::identity::{normalize_email, IdentityResolver, Principal};
use crate::knowledge::KnowledgeSync;
use crate::agent_gateway::AgentGateway;
use crate::thread_token::ThreadTokenCodec;

use super::{MAX_PER_TICK, OUTBOUND_MESSAGE_ID_PREFIX};

const SOURCE: &str = "mail";

pub struct MailPoller<'a> {
    pool: &'a SqlitePool,
    graph: &'a dyn GraphClient,
    gateway: &'a dyn AgentGateway,
    knowledge: &'a KnowledgeSync,
    settings: MailSettings,
}

impl<'a> MailPoller<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        graph: &'a dyn GraphClient,
        gateway: &'a dyn AgentGateway,
        knowledge: &'a KnowledgeSync,
        settings: MailSettings,
    ) -> Self {
        Self {
            pool,
            graph,
            gateway,
            knowledge,
            settings,
        }
    }

    fn is_self_sent(&self, message: &MailMessage) -> bool {
        if message.internet_message_id.starts_with(OUTBOUND_MESSAGE_ID_PREFIX) {
            return true;
        }
        match &self.settings.outbound_sender {
            Some(outbound) => normalize_email(&message.from_address) == normalize_email(outbound),
            None => false,
        }
    }

    /// Runs one tick: fetch since the cursor, self-filter, route each
    /// message, advance the cursor past everything that succeeded or
    /// was poisoned (spec §4.7).
    pub async fn poll_once(&self) -> Result<PartialFailureReport> {
        if !self.settings.enabled {
            return Err(IdeaGraphError::feature_disabled("mail"));
        }
        let mailbox = self
            .settings
            .mailbox
            .as_deref()
            .ok_or_else(|| IdeaGraphError::InvalidInput("mail.mailbox is not configured".into()))?;
        let folder = self.settings.folder.as_deref().unwrap_or("Inbox");

        let cursor = poller_db::get_cursor(self.pool, SOURCE).await?;
        let since = chrono::DateTime::from_timestamp(cursor, 0).unwrap_or_else(chrono::Utc::now);

        let messages = self
            .graph
            .list_mail_since(mailbox, folder, since, MAX_PER_TICK)
            .await?;

        let mut report = PartialFailureReport::default();
        let mut advance_to = cursor;

        for message in messages {
            if self.is_self_sent(&message) {
                advance_to = advance_to.max(message.received_at.timestamp());
                continue;
            }

            let ts = message.received_at.timestamp();
            if poller_db::is_poisoned(self.pool, SOURCE, &message.internet_message_id).await? {
                advance_to = advance_to.max(ts);
                continue;
            }

            match self.handle_message(mailbox, &message).await {
                Ok(()) => {
                    report.record_success();
                    poller_db::clear_failure(self.pool, SOURCE, &message.internet_message_id)
                        .await
                        .ok();
                    advance_to = advance_to.max(ts);
                }
                Err(e) => {
                    warn!(message_id = %message.internet_message_id, error = %e, "mail message processing failed");
                    report.record_failure(e.to_string());
                    match poller_db::record_failure(self.pool, SOURCE, &message.internet_message_id, &e.to_string()).await {
                        Ok(true) => {
                            report.record_poisoned();
                            advance_to = advance_to.max(ts);
                        }
                        _ => break,
                    }
                }
            }
        }

        poller_db::advance_cursor(self.pool, SOURCE, advance_to).await?;
        Ok(report)
    }

    async fn handle_message(&self, mailbox: &str, message: &MailMessage) -> Result<()> {
        let identity = IdentityResolver::new(self.pool);

        if let Some(short_id) = ThreadTokenCodec::extract_short_id(&message.subject) {
            if let Some(task) = tasks::find_by_short_id(self.pool, &short_id).await? {
                let sender = identity.resolve(&Principal::from_email(&message.from_address)).await?;
                task_comments::append(
                    self.pool,
                    &task.id,
                    Some(&sender.id),
                    &message.body_text,
                    CommentSource::Mail,
                    CommentDirection::Inbound,
                    Some(&message.internet_message_id),
                )
                .await?;

                if let Some(assigned_id) = &task.assigned_id {
                    let assignee = users::get(self.pool, assigned_id).await?;
                    if let Some(email) = &assignee.email {
                        let body = format!(
                            "<p>New reply on task <strong>{}</strong> (#{}):</p><blockquote>{}</blockquote>",
                            html_escape(&task.title),
                            task.short_id,
                            html_escape(&message.body_text)
                        );
                        self.graph
                            .send_mail(mailbox, email, &format!("Re: {}", message.subject), &body)
                            .await?;
                    }
                }
                return Ok(());
            }
        }

        let classifier = Classifier::new(self.gateway, self.knowledge, None);
        let candidates = classifier.suggest_items(&message.body_text).await;
        let classification = classifier
            .classify(&message.body_text, &message.from_address, &candidates)
            .await;

        match classification.kind {
            ClassificationKind::Ignore => {
                debug!(reason = ?classification.reason, "mail message ignored");
                Ok(())
            }
            ClassificationKind::Create => self.create_task(mailbox, message, &identity, classification).await,
        }
    }

    async fn create_task(
        &self,
        mailbox: &str,
        message: &MailMessage,
        identity: &IdentityResolver<'_>,
        classification: Classification,
    ) -> Result<()> {
        let item_id = classification
            .item_id
            .ok_or_else(|| IdeaGraphError::domain_conflict("classifier returned create without an item_id"))?;
        let sender = identity.resolve(&Principal::from_email(&message.from_address)).await?;

        let title = classification.task_title.unwrap_or_else(|| message.subject.clone());
        let description = classification.task_description.unwrap_or_else(|| message.body_text.clone());

        let task = tasks::create(
            self.pool,
            &title,
            &description,
            &item_id,
            &sender.id,
            None,
            None,
            Some(&message.internet_message_id),
        )
        .await?;

        task_comments::append(
            self.pool,
            &task.id,
            Some(&sender.id),
            &message.body_text,
            CommentSource::Mail,
            CommentDirection::Inbound,
            Some(&message.internet_message_id),
        )
        .await?;

        self.knowledge.upsert_task(self.pool, &task).await?;

        let reply_subject = reply_prefixed(&message.subject);
        let subject = ThreadTokenCodec::format_subject(&reply_subject, &task.short_id);
        let confirmation = format!(
            "<p>Created task <strong>{}</strong> (#{}) from your message.</p>",
            html_escape(&task.title),
            task.short_id
        );
        self.graph
            .send_mail(mailbox, &message.from_address, &subject, &confirmation)
            .await?;

        task_comments::append(
            self.pool,
            &task.id,
            None,
            &confirmation,
            CommentSource::Mail,
            CommentDirection::Outbound,
            None,
        )
        .await?;

        Ok(())
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Prefixes `subject` with `"Re: "` unless it already starts with one
/// (case-insensitive), so a confirmation reads as a reply to the
/// originating message (spec §8 scenario 1: `"Re: Login broken [IG-TASK:#...]"`).
fn reply_prefixed(subject: &str) -> String {
    let mut prefix: String = subject.chars().take(4).collect();
    prefix.make_ascii_lowercase();
    if prefix == "re: " {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_prefixed_adds_prefix_when_absent() {
        assert_eq!(reply_prefixed("Login broken"), "Re: Login broken");
    }

    #[test]
    fn reply_prefixed_is_idempotent_case_insensitive() {
        assert_eq!(reply_prefixed("re: Login broken"), "re: Login broken");
        assert_eq!(reply_prefixed("Re: Login broken"), "Re: Login broken");
    }
}
