use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    build_client, error_for_status, BackendError, TextGenerator, DEFAULT_TIMEOUT,
    MAX_INPUT_TOKENS, MAX_NEW_TOKENS, NO_REPEAT_NGRAM, TEMPERATURE, TOP_P,
};

/// Default local inference server URL
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:11434";

/// Default local model
pub const DEFAULT_LOCAL_MODEL: &str = "mistral";

const PROVIDER: &str = "local";

/// Wrap a prompt in the instruction delimiters the local model was tuned on.
pub fn wrap_instruction(prompt: &str) -> String {
    format!("<s>[INST] {}[/INST]</s>", prompt)
}

// Token estimate in quarter tokens: ASCII text runs about four characters per
// token, Hangul and other scripts about one.
fn char_cost(c: char) -> usize {
    if c.is_ascii() {
        1
    } else {
        4
    }
}

/// Approximate token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().map(char_cost).sum::<usize>().div_ceil(4)
}

/// Longest prefix of `text` whose estimated size fits in `max_tokens`.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    let budget = max_tokens * 4;
    let mut used = 0;
    for (index, c) in text.char_indices() {
        used += char_cost(c);
        if used > budget {
            return &text[..index];
        }
    }
    text
}

/// Wrap the prompt, cutting its tail so the wrapped text stays within
/// [`MAX_INPUT_TOKENS`]. The instructions at the start are always kept.
fn fit_prompt(prompt: &str) -> String {
    let budget = (MAX_INPUT_TOKENS as usize).saturating_sub(estimate_tokens(&wrap_instruction("")));
    let kept = truncate_to_tokens(prompt, budget);
    if kept.len() < prompt.len() {
        warn!(
            "prompt truncated to ~{} tokens ({} of {} chars kept)",
            MAX_INPUT_TOKENS,
            kept.chars().count(),
            prompt.chars().count()
        );
    }
    wrap_instruction(kept)
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Inference server base URL
    pub base_url: String,
    /// Model name as known to the server
    pub model: String,
    /// Optional bearer token for servers behind an auth proxy
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOCAL_URL.to_string(),
            model: DEFAULT_LOCAL_MODEL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Local inference through an Ollama-compatible `/api/generate` endpoint.
///
/// The prompt is sent in raw mode so the instruction template is applied
/// here rather than by the server. The server replies with the generated
/// continuation only.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    config: LocalConfig,
    client: Client,
}

impl LocalBackend {
    pub fn new(config: LocalConfig) -> Self {
        let client = build_client(config.timeout);
        Self { config, client }
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    fn request_for(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            prompt: fit_prompt(prompt),
            raw: true,
            stream: false,
            options: GenerateOptions {
                // Room for the capped prompt plus the generated tokens.
                num_ctx: MAX_INPUT_TOKENS + MAX_NEW_TOKENS,
                num_predict: MAX_NEW_TOKENS,
                temperature: TEMPERATURE,
                top_p: TOP_P,
                repeat_last_n: NO_REPEAT_NGRAM,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for LocalBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let request = self.request_for(prompt);

        debug!("Calling local model: {} with model {}", url, self.config.model);

        let mut builder = self.client.post(&url).json(&request);
        if let Some(token) = self.config.token.as_deref() {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let response = error_for_status(PROVIDER, builder.send().await?).await?;
        let generated: GenerateResponse = response.json().await?;

        debug!(
            "Local model response received in {:?} ({} tokens)",
            Duration::from_nanos(generated.total_duration.unwrap_or(0)),
            generated.eval_count.unwrap_or(0)
        );

        Ok(generated.response.trim().to_string())
    }
}

// ============================================================================
// Ollama API types
// ============================================================================

/// Request body for the generate endpoint
#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    /// Skip the server-side prompt template
    raw: bool,
    stream: bool,
    options: GenerateOptions,
}

/// Sampling options for the generate endpoint
#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    num_ctx: u32,
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_last_n: u32,
}

/// Response from the generate endpoint
#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}
