//! Text generation backends.
//!
//! Two interchangeable providers sit behind [`TextGenerator`]:
//! - [`LocalBackend`]: a local inference server (Ollama `/api/generate`)
//! - [`OpenAiBackend`]: the hosted OpenAI chat completions API
//!
//! The provider is chosen once, at construction, through [`ModelBackend`].

mod local;
mod openai;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

pub use local::{
    wrap_instruction, LocalBackend, LocalConfig, DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_URL,
};
pub use openai::{OpenAiBackend, OpenAiConfig, DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL};

/// Input cap for the local model, in tokens; longer prompts lose their tail.
pub const MAX_INPUT_TOKENS: u32 = 2048;

/// Upper bound on generated tokens for both providers.
pub const MAX_NEW_TOKENS: u32 = 512;

/// Low temperature keeps the item list stable across runs.
pub const TEMPERATURE: f32 = 0.1;

/// Nucleus sampling cutoff for the local model.
pub const TOP_P: f32 = 0.9;

/// Repetition window for the local model.
pub const NO_REPEAT_NGRAM: u32 = 3;

/// Default HTTP timeout for model calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{0} returned no completion")]
    EmptyResponse(&'static str),
}

/// The single capability the extractor needs from a model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider label for logs.
    fn name(&self) -> &str;

    /// Generate a completion for the prompt. Only newly generated text is
    /// returned, never an echo of the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Which provider to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    OpenAi,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" | "huggingface" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown model type: {}", other)),
        }
    }
}

/// The provider selected by configuration.
#[derive(Debug, Clone)]
pub enum ModelBackend {
    Local(LocalBackend),
    OpenAi(OpenAiBackend),
}

impl ModelBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local(_) => BackendKind::Local,
            Self::OpenAi(_) => BackendKind::OpenAi,
        }
    }
}

#[async_trait]
impl TextGenerator for ModelBackend {
    fn name(&self) -> &str {
        match self {
            Self::Local(backend) => backend.name(),
            Self::OpenAi(backend) => backend.name(),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        match self {
            Self::Local(backend) => backend.generate(prompt).await,
            Self::OpenAi(backend) => backend.generate(prompt).await,
        }
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

async fn error_for_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        provider,
        status,
        body,
    })
}
