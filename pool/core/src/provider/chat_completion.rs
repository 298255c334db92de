//! Chat Completion Backend
//!
//! Backend for OpenAI-compatible chat completion APIs (Groq, xAI, OpenAI,
//! and anything else exposing the same route).
//!
//! # Protocol
//!
//! ```text
//! POST {base_url}/chat/completions
//! Authorization: Bearer <api_key>
//!
//! {"model": "...", "messages": [{"role": "user", "content": "..."}],
//!  "temperature": 0.7, "max_tokens": 2000}
//!
//! 200 {"choices": [{"message": {"content": "..."}}]}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::traits::{Backend, BackendKind, BackendSettings};
use crate::error::ProviderError;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

/// OpenAI-compatible chat completion client
#[derive(Clone, Debug)]
pub struct ChatCompletionBackend {
    settings: BackendSettings,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl ChatCompletionBackend {
    /// Create a backend sharing the given HTTP client.
    ///
    /// `timeout` should match the client's request timeout; it is only used
    /// to label timeout errors.
    #[must_use]
    pub fn new(settings: BackendSettings, http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            settings,
            http_client,
            timeout,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.settings.trimmed_base_url())
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.settings.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

/// Pull `choices[0].message.content` out of a reply body.
///
/// A body that is not a JSON object with a `choices` array is malformed;
/// a well-formed reply with no first choice or no text in it is empty.
pub(crate) fn extract_content(body: &str) -> Result<String, ProviderError> {
    let data: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(format!("reply is not JSON: {e}")))?;

    let choices = data
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ProviderError::parse("reply has no `choices` array"))?;

    let content = choices
        .first()
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or(ProviderError::EmptyResponse)?;

    if content.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(content.to_string())
}

#[async_trait]
impl Backend for ChatCompletionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ChatCompletion
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(&self.settings.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&e, self.timeout))?;

        if !status.is_success() {
            return Err(ProviderError::http_status(status.as_u16(), body));
        }

        extract_content(&body)
    }
}
