use std::sync::Arc;

use action_items_module::{ActionItemExtractor, UserDirectory};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::slack::{SlackClient, SlackError};

/// Shared state for the event routes and the background handlers.
pub struct AppState {
    pub slack: Arc<SlackClient>,
    pub extractor: ActionItemExtractor,
    pub alert_channel: AlertChannel,
    pub signing_secret: Option<String>,
    pub thread_replies_enabled: bool,
    /// The bot's own user id, used to ignore its own messages and mentions
    pub bot_user_id: Option<String>,
}

impl AppState {
    /// Wire the Slack client and the configured model backend together.
    ///
    /// The bot user id is looked up once; when `auth.test` fails the bot
    /// still starts and relies on `bot_id` to recognise its own posts.
    pub async fn from_config(config: &ServiceConfig) -> Self {
        let slack = Arc::new(SlackClient::new(
            config.slack_bot_token.clone(),
            config.slack_api_base_url.clone(),
        ));
        let bot_user_id = match slack.auth_test().await {
            Ok(user_id) => {
                info!("slack bot user id: {}", user_id);
                Some(user_id)
            }
            Err(err) => {
                warn!("auth.test failed, bot user id unknown: {}", err);
                None
            }
        };

        info!(
            "model backend: {} (model {})",
            config.model.kind(),
            config.model.model_name()
        );
        let directory: Arc<dyn UserDirectory> = slack.clone();
        let extractor = ActionItemExtractor::new(Box::new(config.model.build_backend()), directory);

        Self {
            slack,
            extractor,
            alert_channel: AlertChannel::new(config.alert_channel_name.clone()),
            signing_secret: config.slack_signing_secret.clone(),
            thread_replies_enabled: config.thread_replies_enabled,
            bot_user_id,
        }
    }
}

/// Alert channel name with its id resolved lazily on first use.
pub struct AlertChannel {
    name: String,
    id: OnceCell<String>,
}

impl AlertChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve the channel id; only a successful lookup is cached, so a
    /// channel created after a failure is picked up on the next post.
    pub async fn resolve(&self, slack: &SlackClient) -> Result<&str, SlackError> {
        let id = self
            .id
            .get_or_try_init(|| slack.channel_id_by_name(&self.name))
            .await?;
        Ok(id.as_str())
    }
}
