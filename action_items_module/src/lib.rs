//! Action item extraction from chat threads.
//!
//! The pipeline is: thread messages -> transcript (`conversation`) ->
//! instruction prompt (`prompt`) -> language model (`backend`) ->
//! parsed action items (`parse`). `extractor` ties the steps together.

pub mod backend;
pub mod conversation;
pub mod extractor;
pub mod parse;
pub mod prompt;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use backend::{
    BackendError, BackendKind, LocalBackend, LocalConfig, ModelBackend, OpenAiBackend, OpenAiConfig,
    TextGenerator,
};
pub use conversation::{format_conversation, ChatMessage, UserDirectory, UserProfile};
pub use extractor::{ActionItemExtractor, ExtractError};
pub use parse::{parse_action_items, ActionItem};
