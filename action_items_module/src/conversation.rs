//! Conversation formatting: thread messages to a flat, readable transcript.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::BoxError;

/// Author label used when a message carries no user id.
const UNKNOWN_AUTHOR: &str = "Unknown";

// Leading "@name:" attribution, e.g. a message relayed on someone's behalf.
static NAME_PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@([^:\n]+):").unwrap());

// Platform markup such as <@U123>, <#C123|general> or <https://...|link>.
static MARKUP_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// One message of a chat thread, as returned by `conversations.replies`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author user id
    pub user: Option<String>,
    /// Raw message text, including platform markup
    pub text: Option<String>,
    /// Set when the message was posted by a bot
    pub bot_id: Option<String>,
    /// Message timestamp (doubles as the message id)
    pub ts: Option<String>,
    /// Timestamp of the thread root
    pub thread_ts: Option<String>,
}

impl ChatMessage {
    pub fn from_user(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_bot(bot_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            bot_id: Some(bot_id.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_from_bot(&self) -> bool {
        self.bot_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Profile fields used to label transcript lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub real_name: Option<String>,
}

impl UserProfile {
    /// Display name, then real name; blank values are skipped.
    pub fn preferred_name(&self) -> Option<&str> {
        [self.display_name.as_deref(), self.real_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

/// Resolves author ids to profiles. Lookups are best effort.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, BoxError>;
}

#[async_trait]
impl UserDirectory for HashMap<String, UserProfile> {
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, BoxError> {
        self.get(user_id)
            .cloned()
            .ok_or_else(|| format!("user not found: {}", user_id).into())
    }
}

/// Build the transcript for a thread.
///
/// The last message is the mention that triggered the request and is never
/// part of the transcript. Bot messages and messages without text are
/// skipped. Each remaining message becomes one `"<name>: <text>"` line.
pub async fn format_conversation(messages: &[ChatMessage], directory: &dyn UserDirectory) -> String {
    let Some((_, history)) = messages.split_last() else {
        return String::new();
    };

    let mut lines = Vec::new();
    for message in history {
        if message.is_from_bot() {
            continue;
        }
        let Some(text) = message.text.as_deref().filter(|text| !text.trim().is_empty()) else {
            continue;
        };

        let (name_override, body) = split_name_prefix(text);
        let display_name = match name_override {
            Some(name) => name,
            None => resolve_display_name(message.user.as_deref(), directory).await,
        };

        let cleaned = strip_markup(body);
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            lines.push(format!("{}: {}", display_name, cleaned));
        }
    }

    lines.join("\n")
}

async fn resolve_display_name(user_id: Option<&str>, directory: &dyn UserDirectory) -> String {
    let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
        return UNKNOWN_AUTHOR.to_string();
    };

    match directory.user_profile(user_id).await {
        Ok(profile) => profile
            .preferred_name()
            .map(str::to_string)
            .unwrap_or_else(|| user_id.to_string()),
        Err(err) => {
            warn!("user profile lookup failed for {}: {}", user_id, err);
            user_id.to_string()
        }
    }
}

/// Split a leading `@name:` attribution off the text.
fn split_name_prefix(text: &str) -> (Option<String>, &str) {
    let Some(captures) = NAME_PREFIX_PATTERN.captures(text) else {
        return (None, text);
    };
    let (Some(full), Some(name)) = (captures.get(0), captures.get(1)) else {
        return (None, text);
    };
    let name = name.as_str().trim();
    if name.is_empty() {
        return (None, text);
    }
    (Some(name.to_string()), text[full.end()..].trim())
}

fn strip_markup(text: &str) -> String {
    MARKUP_PATTERN.replace_all(text, "").into_owned()
}
