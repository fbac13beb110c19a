use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::ChatMessage;

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        temperature: f64,
        messages: &[ChatMessage],
    ) -> anyhow::Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        model: &str,
        temperature: f64,
        messages: &[ChatMessage],
    ) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model, messages = messages.len(), "sending chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model,
                temperature,
                messages,
                stream: false,
            })
            .send()
            .await
            .context("failed to reach the chat completion endpoint")?
            .error_for_status()
            .context("chat completion request was rejected")?;

        let body: CompletionResponse = response
            .json()
            .await
            .context("failed to decode chat completion response")?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_choice_list_decodes() {
        let body: CompletionResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(body.choices.is_empty());
    }

    #[test]
    fn base_url_is_normalized() {
        let client = OpenAiClient::new("https://api.example.com/v1/", "key");
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }
}
