//! Slack Web API client.
//!
//! Covers the handful of methods the bot needs: reading a thread and user
//! profiles, finding the alert channel, joining channels and posting.

use std::fmt;

use action_items_module::{BoxError, ChatMessage, UserDirectory, UserProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Page size for cursor-paginated methods.
const PAGE_LIMIT: u32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Slack API {method} returned {status}")]
    Status {
        method: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("Slack API {method} error: {error}")]
    Api { method: &'static str, error: String },
    #[error("Slack API {method} response could not be decoded: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
}

/// Coarse failure classes used for operator-facing log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlackFailure {
    ChannelNotFound,
    NotInChannel,
    MissingScope,
    Other,
}

impl SlackFailure {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ChannelNotFound => "channel could not be found",
            Self::NotInChannel => "bot is not a member of the channel",
            Self::MissingScope => "bot token lacks a required OAuth scope",
            Self::Other => "Slack request failed",
        }
    }
}

impl fmt::Display for SlackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl SlackError {
    pub fn classify(&self) -> SlackFailure {
        match self {
            Self::ChannelNotFound(_) => SlackFailure::ChannelNotFound,
            Self::Api { error, .. } => match error.as_str() {
                "channel_not_found" => SlackFailure::ChannelNotFound,
                "not_in_channel" => SlackFailure::NotInChannel,
                "missing_scope" => SlackFailure::MissingScope,
                _ => SlackFailure::Other,
            },
            _ => SlackFailure::Other,
        }
    }
}

/// Which channel listing to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelVisibility {
    Public,
    Private,
}

impl ChannelVisibility {
    fn as_type(&self) -> &'static str {
        match self {
            Self::Public => "public_channel",
            Self::Private => "private_channel",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlackClient {
    token: String,
    api_base: String,
    client: Client,
}

impl SlackClient {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Look up a user's profile (`users.info`).
    pub async fn users_info(&self, user_id: &str) -> Result<UserProfile, SlackError> {
        let response: UsersInfoResponse = self
            .get("users.info", &[("user", user_id.to_string())])
            .await?;
        Ok(response.user.profile)
    }

    /// Fetch every message of a thread, root first (`conversations.replies`).
    pub async fn conversations_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<ChatMessage>, SlackError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("channel", channel.to_string()),
                ("ts", thread_ts.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(cursor) = cursor.take() {
                query.push(("cursor", cursor));
            }
            let page: RepliesPage = self.get("conversations.replies", &query).await?;
            messages.extend(page.messages);
            match page.response_metadata.next_cursor() {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(messages)
    }

    /// Search one channel listing for a channel name (`conversations.list`).
    pub async fn find_channel(
        &self,
        name: &str,
        visibility: ChannelVisibility,
    ) -> Result<Option<String>, SlackError> {
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("types", visibility.as_type().to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(cursor) = cursor.take() {
                query.push(("cursor", cursor));
            }
            let page: ChannelsPage = self.get("conversations.list", &query).await?;
            if let Some(channel) = page.channels.into_iter().find(|channel| channel.name == name) {
                return Ok(Some(channel.id));
            }
            match page.response_metadata.next_cursor() {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }
    }

    /// Resolve a channel name to its id, searching public channels first and
    /// private channels second.
    pub async fn channel_id_by_name(&self, name: &str) -> Result<String, SlackError> {
        for visibility in [ChannelVisibility::Public, ChannelVisibility::Private] {
            if let Some(id) = self.find_channel(name, visibility).await? {
                debug!("resolved channel {} to {} ({:?})", name, id, visibility);
                return Ok(id);
            }
        }
        Err(SlackError::ChannelNotFound(name.to_string()))
    }

    /// Post a message, optionally as a thread reply. Returns the message ts.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackError> {
        let mut request = json!({
            "channel": channel,
            "text": text,
            "mrkdwn": true
        });
        if let Some(ts) = thread_ts {
            request["thread_ts"] = Value::String(ts.to_string());
        }
        let response: PostMessageResponse = self.post("chat.postMessage", &request).await?;
        Ok(response.ts)
    }

    /// Join a public channel (`conversations.join`).
    pub async fn conversations_join(&self, channel: &str) -> Result<(), SlackError> {
        let _: Value = self
            .post("conversations.join", &json!({ "channel": channel }))
            .await?;
        Ok(())
    }

    /// Invite users to a channel (`conversations.invite`).
    pub async fn conversations_invite(&self, channel: &str, user_ids: &[&str]) -> Result<(), SlackError> {
        let _: Value = self
            .post(
                "conversations.invite",
                &json!({ "channel": channel, "users": user_ids.join(",") }),
            )
            .await?;
        Ok(())
    }

    /// The bot's own user id (`auth.test`).
    pub async fn auth_test(&self) -> Result<String, SlackError> {
        let response: AuthTestResponse = self.post("auth.test", &json!({})).await?;
        Ok(response.user_id)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        method: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, SlackError> {
        let response = self
            .client
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        decode(method, response).await
    }

    async fn post<T: DeserializeOwned>(&self, method: &'static str, body: &Value) -> Result<T, SlackError> {
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(body)
            .send()
            .await?;
        decode(method, response).await
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }
}

#[async_trait]
impl UserDirectory for SlackClient {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, BoxError> {
        Ok(self.users_info(user_id).await?)
    }
}

async fn decode<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, SlackError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SlackError::Status { method, status });
    }
    let body: Value = response.json().await?;
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        return Err(SlackError::Api { method, error });
    }
    serde_json::from_value(body).map_err(|source| SlackError::Decode { method, source })
}

// ============================================================================
// Slack API types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

trait NextCursor {
    fn next_cursor(self) -> Option<String>;
}

impl NextCursor for Option<ResponseMetadata> {
    fn next_cursor(self) -> Option<String> {
        self.and_then(|meta| meta.next_cursor)
            .filter(|cursor| !cursor.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    profile: UserProfile,
}

#[derive(Debug, Deserialize)]
struct RepliesPage {
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChannelsPage {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    ts: String,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: String,
}
