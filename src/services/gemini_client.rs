use anyhow::anyhow;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;

use crate::configuration::ClassifierSettings;

/// Prompt in, free text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Gemini through its OpenAI compatible chat completions endpoint.
pub struct GeminiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: Option<u32>,
}

impl GeminiClient {
    pub fn new(api_key: String, settings: &ClassifierSettings) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(settings.api_base.clone());
        GeminiClient {
            client: Client::with_config(config),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(self.model.clone())
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .response_format(ResponseFormat::JsonObject);

        // Thinking models count their reasoning against this cap
        if let Some(max_tokens) = self.max_tokens {
            request.max_tokens(max_tokens);
        }

        let response = self.client.chat().create(request.build()?).await?;
        log::debug!("Response: {:?}", response);

        reply_text(response)
    }
}

fn reply_text(response: CreateChatCompletionResponse) -> anyhow::Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No choices in Gemini response"))?;

    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(anyhow!(
            "No content in Gemini response (finish reason: {:?})",
            choice.finish_reason
        )),
    }
}

#[cfg(test)]
mod tests {
    use async_openai::types::CreateChatCompletionResponse;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    use super::{reply_text, TextGenerator};
    use crate::{
        domain::{
            message::GroupMessage,
            verdict::{Classification, FAILED_EXPLANATION},
        },
        services::classify_group_relevance,
    };

    fn response(content: Option<&str>, finish_reason: &str) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gemini-2.5-flash",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": finish_reason
            }]
        }))
        .unwrap()
    }

    #[test]
    fn reply_text_returns_content() {
        let text = reply_text(response(Some(r#"{"is_relevant": true}"#), "stop")).unwrap();
        assert_eq!(text, r#"{"is_relevant": true}"#);
    }

    #[test]
    fn truncated_reply_without_content_is_an_error() {
        let err = reply_text(response(None, "length")).unwrap_err();
        assert!(err.to_string().contains("Length"));

        assert!(reply_text(response(Some("  "), "length")).is_err());
    }

    struct TruncatingGenerator;

    #[async_trait]
    impl TextGenerator for TruncatingGenerator {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            reply_text(response(None, "length"))
        }
    }

    #[tokio::test]
    async fn truncated_reply_classifies_as_failed() {
        let messages = vec![GroupMessage {
            date: Utc::now(),
            sender: None,
            text: "hello".to_string(),
        }];

        let classification = classify_group_relevance(&TruncatingGenerator, "foo", &messages).await;

        assert!(matches!(classification, Classification::Failed { .. }));
        let verdict = classification.into_verdict();
        assert_eq!(verdict.is_relevant, None);
        assert_eq!(verdict.explanation, FAILED_EXPLANATION);
    }
}