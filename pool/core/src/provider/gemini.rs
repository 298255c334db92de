//! Gemini Backend
//!
//! Backend for Google's Gemini models through the `generateContent` API,
//! the same endpoint the vendor SDKs wrap.
//!
//! ```text
//! POST {base_url}/models/{model}:generateContent
//! x-goog-api-key: <api_key>
//!
//! {"contents": [{"role": "user", "parts": [{"text": "..."}]}],
//!  "generationConfig": {"temperature": 0.7, "maxOutputTokens": 2000}}
//!
//! 200 {"candidates": [{"content": {"parts": [{"text": "..."}]}}]}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::traits::{Backend, BackendKind, BackendSettings};
use crate::error::ProviderError;

/// Default Gemini API base URL
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client
#[derive(Clone, Debug)]
pub struct GeminiBackend {
    settings: BackendSettings,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl GeminiBackend {
    /// Create a backend sharing the given HTTP client
    #[must_use]
    pub fn new(settings: BackendSettings, http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            settings,
            http_client,
            timeout,
        }
    }

    fn generate_url(&self) -> String {
        let model = &self.settings.model;
        let model_path = if model.starts_with("models/") {
            model.clone()
        } else {
            format!("models/{model}")
        };
        format!(
            "{}/{model_path}:generateContent",
            self.settings.trimmed_base_url()
        )
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "maxOutputTokens": self.settings.max_tokens,
            },
        });

        if let Some(ref system) = self.settings.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        body
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(body: &str) -> Result<String, ProviderError> {
    let data: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(format!("reply is not JSON: {e}")))?;

    let candidates = data
        .get("candidates")
        .and_then(|c| c.as_array())
        .ok_or(ProviderError::EmptyResponse)?;

    let parts = candidates
        .first()
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())
        .ok_or(ProviderError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl Backend for GeminiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .http_client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.settings.api_key)
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

        extract_text(&body)
    }
}
