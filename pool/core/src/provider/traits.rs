//! Provider Backend Traits
//!
//! A backend speaks one generation dialect and performs exactly one network
//! call per [`Backend::complete`]. It does not retry, back off, or keep
//! stats; [`Provider`](super::Provider) wraps it with those concerns and the
//! pool owns everything that crosses providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Wire dialect a provider speaks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible `POST {base}/chat/completions`
    ChatCompletion,
    /// Gemini `generateContent` API
    Gemini,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::ChatCompletion => "chat_completion",
            Self::Gemini => "gemini",
        })
    }
}

/// Settings shared by every backend kind
#[derive(Clone, Debug)]
pub struct BackendSettings {
    /// Credential sent with each request
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Endpoint base URL, without the operation path
    pub base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Optional system instruction sent ahead of the prompt
    pub system_prompt: Option<String>,
}

impl BackendSettings {
    /// Create settings with default sampling parameters
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            temperature: 0.7,
            max_tokens: 2000,
            system_prompt: None,
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub(crate) fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// One text-generation backend
///
/// Implement this trait to add another provider dialect.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Dialect this backend speaks
    fn kind(&self) -> BackendKind;

    /// Model identifier sent to the backend
    fn model(&self) -> &str;

    /// Send the prompt once and return the reply text
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
