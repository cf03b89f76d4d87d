//! Slack bot that turns a thread into action items when mentioned.

pub mod config;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod slack;
pub mod state;
pub mod verify;

pub use config::{ConfigError, ModelConfig, ServiceConfig};
pub use handlers::HandlerOutcome;
pub use slack::{SlackClient, SlackError, SlackFailure};
pub use state::{AlertChannel, AppState};
