//! Event handlers: mentions post to the alert channel, thread messages are
//! answered in the thread itself.

use action_items_module::ActionItem;
use tracing::{error, info, warn};

use crate::events::MessageEvent;
use crate::slack::{SlackError, SlackFailure};
use crate::state::AppState;

pub const ALERT_HEADER: &str = "*새로운 액션 아이템이 생성되었습니다*";
pub const THREAD_REPLY_HEADER: &str = "*액션 아이템 목록:*";
pub const NO_ACTION_ITEMS_REPLY: &str = "액션 아이템을 추출할 수 없습니다.";

/// What a handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Posted a message; carries its ts.
    Posted(String),
    NoActionItems,
    ExtractionFailed,
    Ignored(&'static str),
    SlackFailed(SlackFailure),
}

/// Link to a message as `https://app.slack.com/archives/{channel}/p{ts}`,
/// with the dot removed from the ts.
pub fn thread_link(channel: &str, thread_ts: &str) -> String {
    format!(
        "https://app.slack.com/archives/{}/p{}",
        channel,
        thread_ts.replace('.', "")
    )
}

/// Alert channel message: header, link back to the thread, then one bullet
/// per item.
pub fn format_alert_message(items: &[ActionItem], channel: &str, thread_ts: &str) -> String {
    let mut message = format!(
        "{}\n원본 대화: <{}|원본 대화>\n",
        ALERT_HEADER,
        thread_link(channel, thread_ts)
    );
    for item in items {
        message.push('\n');
        message.push_str("• ");
        message.push_str(item.as_str());
    }
    message
}

pub fn format_thread_reply(items: &[ActionItem]) -> String {
    if items.is_empty() {
        return NO_ACTION_ITEMS_REPLY.to_string();
    }
    let bullets: Vec<String> = items.iter().map(|item| format!("• {}", item)).collect();
    format!("{}\n{}", THREAD_REPLY_HEADER, bullets.join("\n"))
}

/// Post items to the alert channel, resolving its id on first use.
pub async fn post_action_items(
    state: &AppState,
    items: &[ActionItem],
    channel: &str,
    thread_ts: &str,
) -> Result<String, SlackError> {
    let alert_channel = state.alert_channel.resolve(&state.slack).await?;
    let message = format_alert_message(items, channel, thread_ts);
    let ts = state.slack.post_message(alert_channel, &message, None).await?;
    info!(
        "posted {} action items to #{} ({})",
        items.len(),
        state.alert_channel.name(),
        ts
    );
    Ok(ts)
}

/// Handle an `app_mention`: extract action items from the surrounding thread
/// and post them to the alert channel.
pub async fn handle_app_mention(state: &AppState, event: &MessageEvent) -> HandlerOutcome {
    let thread_ts = event.thread_root();
    info!(
        "app_mention channel={} thread_ts={} user={}",
        event.channel,
        thread_ts,
        event.user.as_deref().unwrap_or("-")
    );

    let messages = match state
        .slack
        .conversations_replies(&event.channel, thread_ts)
        .await
    {
        Ok(messages) => messages,
        Err(err) => return slack_failed("failed to read thread", &err),
    };
    info!("fetched {} messages from thread {}", messages.len(), thread_ts);

    let items = match state.extractor.try_extract(&messages).await {
        Ok(items) => items,
        Err(err) => {
            error!("action item extraction failed: {}", err);
            return HandlerOutcome::ExtractionFailed;
        }
    };
    if items.is_empty() {
        info!("no action items found in thread {}", thread_ts);
        return HandlerOutcome::NoActionItems;
    }

    match post_action_items(state, &items, &event.channel, thread_ts).await {
        Ok(ts) => HandlerOutcome::Posted(ts),
        Err(err) => slack_failed("failed to post action items", &err),
    }
}

/// Handle a plain `message` event inside a thread by replying in that thread
/// with the extracted items.
pub async fn handle_thread_message(state: &AppState, event: &MessageEvent) -> HandlerOutcome {
    if !state.thread_replies_enabled {
        return HandlerOutcome::Ignored("thread_replies_disabled");
    }
    if event.is_from_bot(state.bot_user_id.as_deref()) {
        return HandlerOutcome::Ignored("bot_message");
    }
    if event.subtype.is_some() {
        return HandlerOutcome::Ignored("subtype");
    }
    if !event.is_thread_message() {
        return HandlerOutcome::Ignored("not_in_thread");
    }
    // Mentions arrive as app_mention too and are handled there.
    if let Some(bot_user_id) = state.bot_user_id.as_deref() {
        if event.mentions(bot_user_id) {
            return HandlerOutcome::Ignored("mention");
        }
    }

    let thread_ts = event.thread_root();
    info!("thread message channel={} thread_ts={}", event.channel, thread_ts);

    if let Err(err) = ensure_channel_member(state, &event.channel).await {
        return slack_failed("could not join channel", &err);
    }

    let messages = match state
        .slack
        .conversations_replies(&event.channel, thread_ts)
        .await
    {
        Ok(messages) => messages,
        Err(err) => return slack_failed("failed to read thread", &err),
    };

    let items = state.extractor.extract(&messages).await;
    let reply = format_thread_reply(&items);
    match state
        .slack
        .post_message(&event.channel, &reply, Some(thread_ts))
        .await
    {
        Ok(ts) if items.is_empty() => {
            info!("replied in thread {} without action items ({})", thread_ts, ts);
            HandlerOutcome::NoActionItems
        }
        Ok(ts) => HandlerOutcome::Posted(ts),
        Err(err) => slack_failed("failed to reply in thread", &err),
    }
}

/// Join the channel, falling back to inviting the bot user when joining is
/// not allowed (private channels).
async fn ensure_channel_member(state: &AppState, channel: &str) -> Result<(), SlackError> {
    match state.slack.conversations_join(channel).await {
        Ok(()) => Ok(()),
        Err(join_err) => {
            warn!("conversations.join failed for {}: {}", channel, join_err);
            let bot_user_id = match state.bot_user_id.clone() {
                Some(id) => id,
                None => state.slack.auth_test().await?,
            };
            state
                .slack
                .conversations_invite(channel, &[bot_user_id.as_str()])
                .await
        }
    }
}

fn slack_failed(context: &str, err: &SlackError) -> HandlerOutcome {
    let failure = err.classify();
    match failure {
        SlackFailure::ChannelNotFound => {
            error!("{}: {}; check that the channel exists ({})", context, failure, err)
        }
        SlackFailure::NotInChannel => {
            error!("{}: {}; invite the bot to the channel ({})", context, failure, err)
        }
        SlackFailure::MissingScope => {
            error!("{}: {}; check the app's OAuth scopes ({})", context, failure, err)
        }
        SlackFailure::Other => error!("{}: {}", context, err),
    }
    HandlerOutcome::SlackFailed(failure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<ActionItem> {
        vec![
            ActionItem::new("@*[Sam]*: send the invoice"),
            ActionItem::new("@*[Jin]*: book the room"),
        ]
    }

    #[test]
    fn thread_link_drops_the_dot() {
        assert_eq!(
            thread_link("C123", "1700000000.000100"),
            "https://app.slack.com/archives/C123/p1700000000000100"
        );
    }

    #[test]
    fn alert_message_layout() {
        let message = format_alert_message(&items(), "C123", "1700000000.000100");
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(
            lines,
            vec![
                "*새로운 액션 아이템이 생성되었습니다*",
                "원본 대화: <https://app.slack.com/archives/C123/p1700000000000100|원본 대화>",
                "",
                "• @*[Sam]*: send the invoice",
                "• @*[Jin]*: book the room",
            ]
        );
    }

    #[test]
    fn thread_reply_lists_items_or_apologises() {
        assert_eq!(
            format_thread_reply(&items()),
            "*액션 아이템 목록:*\n• @*[Sam]*: send the invoice\n• @*[Jin]*: book the room"
        );
        assert_eq!(format_thread_reply(&[]), NO_ACTION_ITEMS_REPLY);
    }
}
