//! Chat-completion providers.
//!
//! The chatbot only needs one call: a system prompt plus a single user
//! message in, one assistant message out. [`OpenAIChat`] implements it
//! against `POST {api_base}/chat/completions`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::openai::OpenAIClient;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Returns the assistant's reply to `user` under the `system` prompt.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

pub struct OpenAIChat {
    client: OpenAIClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        let client = OpenAIClient::new(
            config.api_base(),
            api_key,
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let json = self.client.post_json("chat/completions", &body).await?;
        parse_completion(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completion response.
pub fn parse_completion(json: &serde_json::Value) -> Result<String> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow!("Invalid completion response: no choices"))?;

    if let Some(reason) = choice.get("finish_reason").and_then(|r| r.as_str()) {
        if reason == "length" {
            tracing::warn!("completion truncated at llm.max_tokens");
        }
    }

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("Invalid completion response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "  Ship early.\n" },
                "finish_reason": "stop"
            }]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Ship early.");
    }

    #[test]
    fn test_parse_completion_no_choices() {
        let err = parse_completion(&serde_json::json!({ "choices": [] })).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn test_parse_completion_null_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        });
        assert!(parse_completion(&json).is_err());
    }
}
