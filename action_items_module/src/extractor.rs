//! Action item extraction: transcript, prompt, generation, parsing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::backend::{BackendError, TextGenerator};
use crate::conversation::{format_conversation, ChatMessage, UserDirectory};
use crate::parse::{parse_action_items, ActionItem};
use crate::prompt::{build_prompt, seoul_date};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("{backend} generation failed: {source}")]
    Generation {
        backend: String,
        #[source]
        source: BackendError,
    },
}

/// Turns a thread into action items with one model call.
///
/// Holds only immutable handles, so one instance can serve concurrent
/// requests as long as the generator itself can.
pub struct ActionItemExtractor {
    generator: Box<dyn TextGenerator>,
    directory: Arc<dyn UserDirectory>,
    clock: Clock,
}

impl ActionItemExtractor {
    pub fn new(generator: Box<dyn TextGenerator>, directory: Arc<dyn UserDirectory>) -> Self {
        info!("action item extractor ready (backend: {})", generator.name());
        Self {
            generator,
            directory,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the wall clock used for "today" in the prompt.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.generator.name()
    }

    /// Extract action items, telling "nothing found" (`Ok` with an empty
    /// list) apart from a failed model call (`Err`).
    pub async fn try_extract(&self, messages: &[ChatMessage]) -> Result<Vec<ActionItem>, ExtractError> {
        let transcript = format_conversation(messages, self.directory.as_ref()).await;
        info!("conversation length: {} chars", transcript.chars().count());
        debug!("conversation:\n{}", transcript);

        if transcript.is_empty() {
            info!("no conversation content before the mention; skipping model call");
            return Ok(Vec::new());
        }

        let today = seoul_date((self.clock)());
        let prompt = build_prompt(today, &transcript);
        debug!("prompt:\n{}", prompt);

        info!("LLM inference started (backend: {})", self.generator.name());
        let response = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|source| ExtractError::Generation {
                backend: self.generator.name().to_string(),
                source,
            })?;
        info!("LLM inference finished");
        debug!("model response:\n{}", response);

        let items = parse_action_items(&response);
        info!("extracted {} action items", items.len());
        Ok(items)
    }

    /// Extract action items; failures are logged and yield an empty list.
    pub async fn extract(&self, messages: &[ChatMessage]) -> Vec<ActionItem> {
        match self.try_extract(messages).await {
            Ok(items) => items,
            Err(err) => {
                error!(error = ?err, "action item extraction failed: {}", err);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::conversation::UserProfile;

    struct ScriptedGenerator {
        response: String,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl TextGenerator for BrokenGenerator {
        fn name(&self) -> &str {
            "broken"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
            Err(BackendError::EmptyResponse("broken"))
        }
    }

    fn directory() -> Arc<dyn UserDirectory> {
        let mut map = HashMap::new();
        map.insert(
            "U1".to_string(),
            UserProfile {
                display_name: Some("Sam".to_string()),
                real_name: None,
            },
        );
        map.insert(
            "U2".to_string(),
            UserProfile {
                display_name: Some("Jin".to_string()),
                real_name: None,
            },
        );
        Arc::new(map)
    }

    fn scripted(response: &str) -> (Box<dyn TextGenerator>, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let generator = ScriptedGenerator {
            response: response.to_string(),
            prompts: prompts.clone(),
        };
        (Box::new(generator), prompts)
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 16, 30, 0).unwrap()
    }

    fn invoice_thread() -> Vec<ChatMessage> {
        vec![
            ChatMessage::from_user("U1", "@bot please remind Sam to send the invoice by Friday"),
            ChatMessage::from_user("U2", "<@UBOT> ok will do"),
        ]
    }

    #[tokio::test]
    async fn invoice_thread_end_to_end() {
        let (generator, prompts) = scripted("- [Sam]: send the invoice (deadline: 2024-01-05)");
        let extractor = ActionItemExtractor::new(generator, directory()).with_clock(fixed_clock);

        let items = extractor.try_extract(&invoice_thread()).await.unwrap();

        assert_eq!(
            items,
            vec![ActionItem::new("@*[Sam]*: send the invoice (deadline: 2024-01-05)")]
        );
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        // 16:30 UTC on Jan 1st is already Jan 2nd in Seoul.
        assert!(prompts[0].contains("날짜: 2024-01-02"));
        assert!(prompts[0].contains("Sam: @bot please remind Sam to send the invoice by Friday"));
        assert!(!prompts[0].contains("ok will do"));
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_empty() {
        let extractor = ActionItemExtractor::new(Box::new(BrokenGenerator), directory());

        let err = extractor.try_extract(&invoice_thread()).await.unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(extractor.extract(&invoice_thread()).await.is_empty());
    }

    #[tokio::test]
    async fn response_without_items_is_ok_and_empty() {
        let (generator, _) = scripted("대화에서 할 일을 찾을 수 없습니다.");
        let extractor = ActionItemExtractor::new(generator, directory());

        let items = extractor.try_extract(&invoice_thread()).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn empty_transcript_skips_the_model() {
        let (generator, prompts) = scripted("- [Sam]: should never be returned");
        let extractor = ActionItemExtractor::new(generator, directory());

        let thread = vec![
            ChatMessage::from_bot("B1", "- [Sam]: bot summary"),
            ChatMessage::from_user("U1", "<@UBOT>"),
        ];
        let items = extractor.try_extract(&thread).await.unwrap();

        assert!(items.is_empty());
        assert!(prompts.lock().unwrap().is_empty());
    }
}
