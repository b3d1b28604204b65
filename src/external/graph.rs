//! Microsoft Graph client (spec §2 "GraphClient (external)", §6 "Graph API
//! required calls"). Talks to `https://graph.microsoft.com/v1.0` over
//! `reqwest`, the same bearer-token-over-HTTP shape as
//! [`crate::knowledge::cloud::CloudVectorIndex`]. The access token itself
//! is supplied by the caller (obtained and cached by
//! [`crate::cache::GraphTokenCache`], spec §5 "Graph auth token, TTL ≈ 55
//! min") — this client has no opinion on how the token was minted.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{IdeaGraphError, Result};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: String,
    pub subject: String,
    pub body_text: String,
    pub from_address: String,
    pub internet_message_id: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: String,
    pub body_text: String,
    pub sender_object_id: Option<String>,
    pub sender_upn: Option<String>,
    pub sender_display_name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct GraphUser {
    pub object_id: String,
    pub user_principal_name: String,
    pub display_name: String,
    pub mail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_id: String,
    pub web_url: String,
}

/// The minimal surface the core depends on. A `wiremock`-backed test
/// double implements this trait directly; production wires
/// [`HttpGraphClient`].
#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn list_mail_since(
        &self,
        mailbox: &str,
        folder: &str,
        since: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> Result<Vec<MailMessage>>;

    async fn move_mail(&self, mailbox: &str, message_id: &str, destination_folder: &str) -> Result<()>;

    async fn send_mail(&self, from_mailbox: &str, to: &str, subject: &str, body_html: &str) -> Result<()>;

    async fn list_channel_messages_since(
        &self,
        team_id: &str,
        channel_id: &str,
        since: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>>;

    async fn post_channel_message(&self, team_id: &str, channel_id: &str, body_html: &str) -> Result<()>;

    async fn get_user_by_object_id(&self, object_id: &str) -> Result<GraphUser>;

    async fn upload_file(
        &self,
        drive_id: &str,
        folder_path: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadedFile>;

    async fn move_file(&self, drive_id: &str, file_id: &str, destination_folder_path: &str) -> Result<()>;

    async fn delete_file(&self, drive_id: &str, file_id: &str) -> Result<()>;

    async fn create_folder(&self, drive_id: &str, parent_path: &str, folder_name: &str) -> Result<()>;
}

pub struct HttpGraphClient {
    client: Client,
    access_token: String,
}

impl HttpGraphClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        Ok(Self {
            client,
            access_token: access_token.into(),
        })
    }

    fn translate(&self, status: StatusCode, body: String) -> IdeaGraphError {
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            IdeaGraphError::transient("graph", format!("{status}: {body}"))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            IdeaGraphError::permanent("graph", "Graph authentication failed")
        } else {
            IdeaGraphError::permanent("graph", format!("Graph rejected the request: {status}"))
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate(status, body));
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct GraphListResponse<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
struct GraphMessage {
    id: String,
    subject: Option<String>,
    #[serde(rename = "bodyPreview")]
    body_preview: Option<String>,
    from: Option<GraphRecipient>,
    #[serde(rename = "internetMessageId")]
    internet_message_id: Option<String>,
    #[serde(rename = "receivedDateTime")]
    received_date_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
struct GraphRecipient {
    #[serde(rename = "emailAddress")]
    email_address: GraphEmailAddress,
}

#[derive(Deserialize)]
struct GraphEmailAddress {
    address: String,
}

#[derive(Deserialize)]
struct GraphChannelMessage {
    id: String,
    body: GraphMessageBody,
    from: Option<GraphChannelSender>,
    #[serde(rename = "createdDateTime")]
    created_date_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
struct GraphMessageBody {
    content: String,
}

#[derive(Deserialize)]
struct GraphChannelSender {
    user: Option<GraphChannelUser>,
}

#[derive(Deserialize)]
struct GraphChannelUser {
    id: Option<String>,
    #[serde(rename = "userIdentityType")]
    #[allow(dead_code)]
    user_identity_type: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[async_trait]
impl GraphClient for HttpGraphClient {
    async fn list_mail_since(
        &self,
        mailbox: &str,
        folder: &str,
        since: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> Result<Vec<MailMessage>> {
        let filter = format!("receivedDateTime gt {}", since.to_rfc3339());
        let url = format!(
            "{GRAPH_BASE}/users/{mailbox}/mailFolders/{folder}/messages?$filter={}&$top={}&$orderby=receivedDateTime asc",
            urlencoding::encode(&filter),
            limit
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        let response = self.check(response).await?;

        let parsed: GraphListResponse<GraphMessage> = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;

        Ok(parsed
            .value
            .into_iter()
            .map(|m| MailMessage {
                id: m.id,
                subject: m.subject.unwrap_or_default(),
                body_text: m.body_preview.unwrap_or_default(),
                from_address: m
                    .from
                    .map(|f| f.email_address.address)
                    .unwrap_or_default(),
                internet_message_id: m.internet_message_id.unwrap_or_default(),
                received_at: m.received_date_time,
            })
            .collect())
    }

    async fn move_mail(&self, mailbox: &str, message_id: &str, destination_folder: &str) -> Result<()> {
        let url = format!("{GRAPH_BASE}/users/{mailbox}/messages/{message_id}/move");
        #[derive(Serialize)]
        struct MoveRequest<'a> {
            #[serde(rename = "destinationId")]
            destination_id: &'a str,
        }
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&MoveRequest {
                destination_id: destination_folder,
            })
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        self.check(response).await?;
        Ok(())
    }

    async fn send_mail(&self, from_mailbox: &str, to: &str, subject: &str, body_html: &str) -> Result<()> {
        let url = format!("{GRAPH_BASE}/users/{from_mailbox}/sendMail");
        #[derive(Serialize)]
        struct SendMailRequest<'a> {
            message: SendMailMessage<'a>,
            #[serde(rename = "saveToSentItems")]
            save_to_sent_items: bool,
        }
        #[derive(Serialize)]
        struct SendMailMessage<'a> {
            subject: &'a str,
            body: SendMailBody<'a>,
            #[serde(rename = "toRecipients")]
            to_recipients: Vec<SendMailRecipient<'a>>,
        }
        #[derive(Serialize)]
        struct SendMailBody<'a> {
            #[serde(rename = "contentType")]
            content_type: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct SendMailRecipient<'a> {
            #[serde(rename = "emailAddress")]
            email_address: SendMailAddress<'a>,
        }
        #[derive(Serialize)]
        struct SendMailAddress<'a> {
            address: &'a str,
        }

        let request = SendMailRequest {
            message: SendMailMessage {
                subject,
                body: SendMailBody {
                    content_type: "HTML",
                    content: body_html,
                },
                to_recipients: vec![SendMailRecipient {
                    email_address: SendMailAddress { address: to },
                }],
            },
            save_to_sent_items: true,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        self.check(response).await?;
        Ok(())
    }

    async fn list_channel_messages_since(
        &self,
        team_id: &str,
        channel_id: &str,
        since: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>> {
        let url = format!("{GRAPH_BASE}/teams/{team_id}/channels/{channel_id}/messages?$top={limit}");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        let response = self.check(response).await?;

        let parsed: GraphListResponse<GraphChannelMessage> = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;

        Ok(parsed
            .value
            .into_iter()
            .filter(|m| m.created_date_time > since)
            .map(|m| {
                let user = m.from.and_then(|f| f.user);
                ChannelMessage {
                    id: m.id,
                    body_text: m.body.content,
                    sender_object_id: user.as_ref().and_then(|u| u.id.clone()),
                    sender_upn: None,
                    sender_display_name: user.and_then(|u| u.display_name),
                    created_at: m.created_date_time,
                }
            })
            .collect())
    }

    async fn post_channel_message(&self, team_id: &str, channel_id: &str, body_html: &str) -> Result<()> {
        let url = format!("{GRAPH_BASE}/teams/{team_id}/channels/{channel_id}/messages");
        #[derive(Serialize)]
        struct PostMessageRequest<'a> {
            body: PostMessageBody<'a>,
        }
        #[derive(Serialize)]
        struct PostMessageBody<'a> {
            #[serde(rename = "contentType")]
            content_type: &'a str,
            content: &'a str,
        }
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&PostMessageRequest {
                body: PostMessageBody {
                    content_type: "html",
                    content: body_html,
                },
            })
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        self.check(response).await?;
        Ok(())
    }

    async fn get_user_by_object_id(&self, object_id: &str) -> Result<GraphUser> {
        let url = format!("{GRAPH_BASE}/users/{object_id}");
        #[derive(Deserialize)]
        struct GraphUserResponse {
            id: String,
            #[serde(rename = "userPrincipalName")]
            user_principal_name: String,
            #[serde(rename = "displayName")]
            display_name: String,
            mail: Option<String>,
        }
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        let response = self.check(response).await?;
        let parsed: GraphUserResponse = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        Ok(GraphUser {
            object_id: parsed.id,
            user_principal_name: parsed.user_principal_name,
            display_name: parsed.display_name,
            mail: parsed.mail,
        })
    }

    async fn upload_file(
        &self,
        drive_id: &str,
        folder_path: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadedFile> {
        let url = format!(
            "{GRAPH_BASE}/drives/{drive_id}/root:/{folder_path}/{file_name}:/content"
        );
        #[derive(Deserialize)]
        struct DriveItem {
            id: String,
            #[serde(rename = "webUrl")]
            web_url: String,
        }
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        let response = self.check(response).await?;
        let parsed: DriveItem = response
            .json()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        Ok(UploadedFile {
            file_id: parsed.id,
            web_url: parsed.web_url,
        })
    }

    async fn move_file(&self, drive_id: &str, file_id: &str, destination_folder_path: &str) -> Result<()> {
        let url = format!("{GRAPH_BASE}/drives/{drive_id}/items/{file_id}");
        #[derive(Serialize)]
        struct MoveRequest<'a> {
            #[serde(rename = "parentReference")]
            parent_reference: MoveParentReference<'a>,
        }
        #[derive(Serialize)]
        struct MoveParentReference<'a> {
            path: &'a str,
        }
        let path = format!("/drive/root:/{destination_folder_path}");
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.access_token)
            .json(&MoveRequest {
                parent_reference: MoveParentReference { path: &path },
            })
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete_file(&self, drive_id: &str, file_id: &str) -> Result<()> {
        let url = format!("{GRAPH_BASE}/drives/{drive_id}/items/{file_id}");
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(self.translate(status, body));
        }
        Ok(())
    }

    async fn create_folder(&self, drive_id: &str, parent_path: &str, folder_name: &str) -> Result<()> {
        let url = format!("{GRAPH_BASE}/drives/{drive_id}/root:/{parent_path}:/children");
        #[derive(Serialize)]
        struct CreateFolderRequest<'a> {
            name: &'a str,
            folder: serde_json::Value,
            #[serde(rename = "@microsoft.graph.conflictBehavior")]
            conflict_behavior: &'a str,
        }
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&CreateFolderRequest {
                name: folder_name,
                folder: serde_json::json!({}),
                conflict_behavior: "replace",
            })
            .send()
            .await
            .map_err(|e| IdeaGraphError::transient("graph", e.to_string()))?;
        self.check(response).await?;
        Ok(())
    }
}
