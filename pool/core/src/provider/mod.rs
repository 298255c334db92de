//! Provider Adapters
//!
//! A [`Provider`] is one named, independently configured backend plus its
//! stats. Each [`Provider::attempt`] is exactly one call to the backend,
//! bounded by a fixed timeout, and always leaves exactly one update in the
//! provider's stats whatever the outcome.
//!
//! # Available Backends
//!
//! - [`ChatCompletionBackend`]: OpenAI-compatible HTTP chat completions
//! - [`GeminiBackend`]: Gemini `generateContent`

mod chat_completion;
mod gemini;
mod traits;

use std::time::Duration;

use tokio::time::Instant;

use crate::error::ProviderError;
use crate::stats::{ProviderStats, StatsRecord};

pub use chat_completion::ChatCompletionBackend;
pub use gemini::{GeminiBackend, GEMINI_DEFAULT_BASE_URL};
pub use traits::{Backend, BackendKind, BackendSettings};

/// Default bound on a single attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Text produced by a successful attempt
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    /// Reply text, trimmed
    pub text: String,
    /// Wall time of the attempt in milliseconds
    pub latency_ms: f64,
}

/// A named backend with its own stats
pub struct Provider {
    name: String,
    backend: Box<dyn Backend>,
    stats: ProviderStats,
    timeout: Duration,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("kind", &self.backend.kind())
            .field("model", &self.backend.model())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Wrap a backend under a display name
    pub fn new(name: impl Into<String>, backend: impl Backend + 'static) -> Self {
        Self::from_boxed(name, Box::new(backend))
    }

    /// Wrap an already boxed backend
    pub fn from_boxed(name: impl Into<String>, backend: Box<dyn Backend>) -> Self {
        Self {
            name: name.into(),
            backend,
            stats: ProviderStats::new(),
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Display name, unique within a pool
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend dialect
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Live stats cell
    #[must_use]
    pub fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    /// Copy of the current stats
    #[must_use]
    pub fn stats_snapshot(&self) -> StatsRecord {
        self.stats.snapshot()
    }

    /// Make one attempt against the backend
    ///
    /// # Errors
    ///
    /// Returns the backend's [`ProviderError`], a timeout if the backend did
    /// not answer in time, or [`ProviderError::EmptyResponse`] if the reply
    /// was only whitespace.
    pub async fn attempt(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.backend.complete(prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(self.timeout)),
        };
        let latency_ms = started.elapsed().as_micros() as f64 / 1000.0;

        let outcome = outcome.and_then(|text| {
            let text = text.trim();
            if text.is_empty() {
                Err(ProviderError::EmptyResponse)
            } else {
                Ok(text.to_string())
            }
        });

        match outcome {
            Ok(text) => {
                self.stats.record_success(latency_ms);
                Ok(Completion { text, latency_ms })
            }
            Err(err) => {
                self.stats.record_failure(err.to_string());
                Err(err)
            }
        }
    }
}
