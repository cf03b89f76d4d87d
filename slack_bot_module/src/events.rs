//! Slack Events API payloads.

use serde::{Deserialize, Serialize};

/// Outer envelope of an Events API request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    /// Sent once when the request URL is configured.
    UrlVerification { challenge: String },
    EventCallback {
        #[serde(default)]
        team_id: Option<String>,
        #[serde(default)]
        event_id: Option<String>,
        event: SlackEvent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackChallengeResponse {
    pub challenge: String,
}

/// Inner event of an `event_callback` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    AppMention(MessageEvent),
    Message(MessageEvent),
    #[serde(other)]
    Other,
}

/// Fields shared by `app_mention` and `message` events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Set for edits, deletions, joins and other non-plain messages
    #[serde(default)]
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Root of the thread this event belongs to; a top-level message is its
    /// own root.
    pub fn thread_root(&self) -> &str {
        self.thread_ts
            .as_deref()
            .filter(|ts| !ts.is_empty())
            .unwrap_or(&self.ts)
    }

    pub fn is_thread_message(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|ts| !ts.is_empty())
    }

    pub fn is_from_bot(&self, bot_user_id: Option<&str>) -> bool {
        if self.bot_id.as_deref().is_some_and(|id| !id.is_empty()) {
            return true;
        }
        if self.subtype.as_deref() == Some("bot_message") {
            return true;
        }
        matches!((bot_user_id, self.user.as_deref()), (Some(bot), Some(user)) if bot == user)
    }

    pub fn mentions(&self, user_id: &str) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| text.contains(&format!("<@{}>", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_verification() {
        let payload = r#"{"token":"t","challenge":"abc123","type":"url_verification"}"#;
        let envelope: SlackEnvelope = serde_json::from_str(payload).unwrap();
        assert!(matches!(envelope, SlackEnvelope::UrlVerification { challenge } if challenge == "abc123"));
    }

    #[test]
    fn parse_app_mention_in_thread() {
        let payload = r#"{
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev1",
            "event": {
                "type": "app_mention",
                "user": "U2",
                "text": "<@UBOT> 정리해줘",
                "ts": "1700000005.000100",
                "thread_ts": "1700000000.000100",
                "channel": "C1",
                "event_ts": "1700000005.000100"
            }
        }"#;
        let envelope: SlackEnvelope = serde_json::from_str(payload).unwrap();
        let SlackEnvelope::EventCallback { team_id, event, .. } = envelope else {
            panic!("expected event callback");
        };
        assert_eq!(team_id.as_deref(), Some("T1"));
        let SlackEvent::AppMention(event) = event else {
            panic!("expected app_mention");
        };
        assert_eq!(event.channel, "C1");
        assert_eq!(event.thread_root(), "1700000000.000100");
        assert!(event.mentions("UBOT"));
        assert!(!event.is_from_bot(Some("UBOT")));
    }

    #[test]
    fn top_level_mention_is_its_own_root() {
        let event = MessageEvent {
            channel: "C1".to_string(),
            ts: "1700000000.000100".to_string(),
            ..Default::default()
        };
        assert_eq!(event.thread_root(), "1700000000.000100");
        assert!(!event.is_thread_message());
    }

    #[test]
    fn bot_messages_are_recognised() {
        let from_bot_id = MessageEvent {
            bot_id: Some("B1".to_string()),
            ..Default::default()
        };
        let from_subtype = MessageEvent {
            subtype: Some("bot_message".to_string()),
            ..Default::default()
        };
        let from_self = MessageEvent {
            user: Some("UBOT".to_string()),
            ..Default::default()
        };
        assert!(from_bot_id.is_from_bot(None));
        assert!(from_subtype.is_from_bot(None));
        assert!(from_self.is_from_bot(Some("UBOT")));
        assert!(!from_self.is_from_bot(None));
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let envelope: SlackEnvelope = serde_json::from_str(r#"{"type":"app_rate_limited"}"#).unwrap();
        assert!(matches!(envelope, SlackEnvelope::Other));

        let payload = r#"{"type":"event_callback","event":{"type":"reaction_added","user":"U1"}}"#;
        let envelope: SlackEnvelope = serde_json::from_str(payload).unwrap();
        assert!(matches!(
            envelope,
            SlackEnvelope::EventCallback { event: SlackEvent::Other, .. }
        ));
    }
}
