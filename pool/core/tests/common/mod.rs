//! Shared test fixtures: scripted backends that log the order of attempts.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genpool_core::{Backend, BackendKind, Provider, ProviderError};
use parking_lot::Mutex;

/// Names of providers in the order they were attempted
#[derive(Clone, Default)]
pub struct AttemptLog(Arc<Mutex<Vec<String>>>);

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, name: &str) {
        self.0.lock().push(name.to_string());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// One scripted reply
#[derive(Clone)]
pub struct Reply {
    pub delay: Duration,
    pub result: Result<String, ProviderError>,
}

impl Reply {
    pub fn ok(text: &str, delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: Ok(text.to_string()),
        }
    }

    pub fn err(error: ProviderError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }
}

/// Backend that plays back a script, repeating the fallback once it runs out
pub struct Scripted {
    name: String,
    log: AttemptLog,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
}

#[async_trait]
impl Backend for Scripted {
    fn kind(&self) -> BackendKind {
        BackendKind::ChatCompletion
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        self.log.push(&self.name);
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        tokio::time::sleep(reply.delay).await;
        reply.result
    }
}

/// Provider that always answers `"{name} says hi"` after `delay_ms`
pub fn healthy(name: &str, log: &AttemptLog, delay_ms: u64) -> Provider {
    scripted(name, log, vec![], Reply::ok(&format!("{name} says hi"), delay_ms))
}

/// Provider that always fails with HTTP 503
pub fn failing(name: &str, log: &AttemptLog) -> Provider {
    scripted(
        name,
        log,
        vec![],
        Reply::err(ProviderError::http_status(503, "service unavailable")),
    )
}

pub fn scripted(name: &str, log: &AttemptLog, script: Vec<Reply>, fallback: Reply) -> Provider {
    Provider::new(
        name,
        Scripted {
            name: name.to_string(),
            log: log.clone(),
            script: Mutex::new(script.into()),
            fallback,
        },
    )
}
