use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    build_client, error_for_status, BackendError, TextGenerator, DEFAULT_TIMEOUT, MAX_NEW_TOKENS,
    TEMPERATURE,
};
use crate::prompt::SYSTEM_PROMPT;

/// Default OpenAI API URL
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default model for OpenAI
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const PROVIDER: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_OPENAI_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Remote generation through the OpenAI chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = build_client(config.timeout);
        Self { config, client }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl TextGenerator for OpenAiBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(prompt.to_string()),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_NEW_TOKENS,
        };

        debug!("Calling OpenAI: {} with model {}", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(PROVIDER, response).await?;
        let completion: ChatResponse = response.json().await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(BackendError::EmptyResponse(PROVIDER))?;

        debug!("OpenAI response received");

        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

// ============================================================================
// OpenAI API types
// ============================================================================

/// Request body for the chat completions endpoint
#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat message for the OpenAI API
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

/// Response from the chat completions endpoint
#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn backend_for(server: &Server) -> OpenAiBackend {
        OpenAiBackend::new(OpenAiConfig {
            api_key: "sk-test".to_string(),
            api_url: format!("{}/v1", server.url()),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn config_defaults() {
        let config = OpenAiConfig::new("sk-test");
        assert_eq!(config.api_url, DEFAULT_OPENAI_URL);
        assert_eq!(config.model, DEFAULT_OPENAI_MODEL);
    }

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 512,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": "the prompt"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"\n- [Sam]: send the invoice (마감 기한: 2024-01-05)\n"}}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let backend = backend_for(&server);
        let text = backend.generate("the prompt").await.unwrap();

        assert_eq!(text, "- [Sam]: send the invoice (마감 기한: 2024-01-05)");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_choices_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = backend_for(&server).generate("x").await.unwrap_err();
        assert!(matches!(err, BackendError::EmptyResponse("openai")));
    }

    #[tokio::test]
    async fn unauthorized_is_reported_with_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key"}}"#)
            .create_async()
            .await;

        let err = backend_for(&server).generate("x").await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Incorrect API key"));
    }
}
