//! Provider Pool
//!
//! Owns the registered providers, the selection strategy, and the stats
//! store. [`ProviderPool::generate`] tries providers one at a time, never
//! the same provider twice in one call, until one answers or all have
//! failed.
//!
//! # Generate Flow
//!
//! ```text
//! excluded = {}
//! while excluded != all providers:
//!     p = strategy.select(stats snapshot, excluded, cursor)
//!     excluded += p
//!     p.attempt(prompt)  -> Ok(text)  => persist in background, return text
//!                        -> Err(e)    => remember e, continue
//! persist in background, return Exhausted(last error)
//! ```
//!
//! The pool is cheap to clone and every clone shares the same providers,
//! stats, and rotation cursor. Concurrent calls are safe.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::provider::{BackendKind, Provider};
use crate::stats::{JsonFileStore, MemoryStore, StatsDocument, StatsRecord, StatsStore};
use crate::strategy::{ExclusionSet, Strategy};

// ============================================================================
// Stats Report
// ============================================================================

/// Stats of one provider as reported by [`ProviderPool::stats`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProviderSnapshot {
    /// Provider display name
    pub name: String,
    /// Backend dialect
    pub kind: BackendKind,
    /// Model identifier
    pub model: String,
    /// Counters at the time of the snapshot
    pub stats: StatsRecord,
}

/// Pool-wide stats report
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoolStats {
    /// Providers in registration order
    pub providers: Vec<ProviderSnapshot>,
    /// Active selection strategy
    pub strategy: Strategy,
    /// Number of registered providers
    pub total_providers: usize,
}

impl PoolStats {
    /// Look up one provider's stats by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StatsRecord> {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.stats)
    }
}

// ============================================================================
// Pool
// ============================================================================

struct PoolInner {
    providers: Vec<Provider>,
    strategy: Strategy,
    cursor: Mutex<usize>,
    store: Arc<dyn StatsStore>,
    /// Persisted records for names not registered in this pool
    retained: StatsDocument,
    /// Serializes writes so an older snapshot never lands after a newer one
    save_lock: tokio::sync::Mutex<()>,
    overall_deadline: Option<Duration>,
}

impl PoolInner {
    fn document(&self) -> StatsDocument {
        let mut document = self.retained.clone();
        for provider in &self.providers {
            document.insert(provider.name().to_string(), provider.stats_snapshot());
        }
        document
    }

    fn next_provider(&self, excluded: &ExclusionSet) -> Option<usize> {
        let stats: Vec<StatsRecord> = self
            .providers
            .iter()
            .map(Provider::stats_snapshot)
            .collect();
        let mut cursor = self.cursor.lock();
        self.strategy.select(&stats, excluded, &mut cursor)
    }

    async fn persist(&self) {
        let _guard = self.save_lock.lock().await;
        let document = self.document();
        if let Err(e) = self.store.save(&document).await {
            tracing::warn!(error = %e, "Failed to persist provider stats");
        }
    }
}

/// Shared multi-provider generation pool
#[derive(Clone)]
pub struct ProviderPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ProviderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPool")
            .field("providers", &self.inner.providers)
            .field("strategy", &self.inner.strategy)
            .field("overall_deadline", &self.inner.overall_deadline)
            .finish_non_exhaustive()
    }
}

impl ProviderPool {
    /// Start building a pool with the given strategy
    #[must_use]
    pub fn builder(strategy: Strategy) -> PoolBuilder {
        PoolBuilder::new(strategy)
    }

    /// Build a pool from resolved configuration, persisting to
    /// `config.stats_path`
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoProviders`] if no provider is configured, or
    /// [`PoolError::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        if config.providers.is_empty() {
            return Err(PoolError::NoProviders);
        }

        let http_client = config.http_client()?;
        let providers = config
            .providers
            .iter()
            .map(|p| p.build_provider(&http_client, config.attempt_timeout));

        let mut builder = Self::builder(config.strategy)
            .with_providers(providers)
            .with_store(JsonFileStore::new(&config.stats_path));
        if let Some(deadline) = config.overall_deadline {
            builder = builder.with_overall_deadline(deadline);
        }
        builder.build()
    }

    /// Generate text for `prompt`, failing over between providers.
    ///
    /// Each provider is attempted at most once. The first non-empty reply is
    /// returned trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] carrying the last provider's error
    /// once every provider has failed, or once the overall deadline (if one
    /// is set) has passed before the next attempt.
    pub async fn generate(&self, prompt: &str) -> Result<String, PoolError> {
        let span = tracing::info_span!(
            "generate",
            request_id = %uuid::Uuid::new_v4(),
            strategy = %self.inner.strategy,
        );
        self.generate_inner(prompt).instrument(span).await
    }

    async fn generate_inner(&self, prompt: &str) -> Result<String, PoolError> {
        let inner = &self.inner;
        let total = inner.providers.len();
        let deadline = inner.overall_deadline.map(|d| Instant::now() + d);
        let mut excluded = ExclusionSet::with_capacity(total);
        let mut last_error: Option<String> = None;

        while excluded.len() < total {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(attempted = excluded.len(), "Overall deadline reached");
                break;
            }

            let Some(index) = inner.next_provider(&excluded) else {
                break;
            };
            excluded.insert(index);
            let provider = &inner.providers[index];

            tracing::debug!(
                provider = provider.name(),
                attempt = excluded.len(),
                "Trying provider"
            );

            match provider.attempt(prompt).await {
                Ok(completion) => {
                    tracing::info!(
                        provider = provider.name(),
                        latency_ms = completion.latency_ms,
                        "Generation succeeded"
                    );
                    self.persist_in_background();
                    return Ok(completion.text);
                }
                Err(err) => {
                    tracing::warn!(
                        provider = provider.name(),
                        kind = %err.kind(),
                        error = %err,
                        "Provider attempt failed"
                    );
                    last_error = Some(format!("{}: {err}", provider.name()));
                }
            }
        }

        self.persist_in_background();
        tracing::error!(
            attempted = excluded.len(),
            last_error = last_error.as_deref().unwrap_or("none"),
            "All providers failed"
        );
        Err(PoolError::Exhausted { last_error })
    }

    fn persist_in_background(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.persist().await });
    }

    /// Write the current stats to the store and wait for it to finish.
    ///
    /// Failures are logged, never returned.
    pub async fn flush_stats(&self) {
        self.inner.persist().await;
    }

    /// Snapshot of every provider's stats
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let providers = self
            .inner
            .providers
            .iter()
            .map(|p| ProviderSnapshot {
                name: p.name().to_string(),
                kind: p.kind(),
                model: p.model().to_string(),
                stats: p.stats_snapshot(),
            })
            .collect::<Vec<_>>();

        PoolStats {
            total_providers: providers.len(),
            providers,
            strategy: self.inner.strategy,
        }
    }

    /// Registered providers in registration order
    #[must_use]
    pub fn providers(&self) -> &[Provider] {
        &self.inner.providers
    }

    /// Active selection strategy
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.inner.strategy
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ProviderPool`]
pub struct PoolBuilder {
    strategy: Strategy,
    providers: Vec<Provider>,
    store: Option<Arc<dyn StatsStore>>,
    overall_deadline: Option<Duration>,
}

impl PoolBuilder {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            providers: Vec::new(),
            store: None,
            overall_deadline: None,
        }
    }

    /// Register a provider; registration order is preserved
    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Register several providers in order
    #[must_use]
    pub fn with_providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Persist stats through `store` (defaults to an in-memory store)
    #[must_use]
    pub fn with_store(mut self, store: impl StatsStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Persist stats through a shared store
    #[must_use]
    pub fn with_shared_store(mut self, store: Arc<dyn StatsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stop starting new attempts once `deadline` has elapsed in a call
    #[must_use]
    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = Some(deadline);
        self
    }

    /// Build the pool, seeding provider stats from the store.
    ///
    /// A store that fails to load is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoProviders`] if no provider was registered, or
    /// [`PoolError::DuplicateProvider`] if two providers share a name.
    pub fn build(self) -> Result<ProviderPool, PoolError> {
        if self.providers.is_empty() {
            return Err(PoolError::NoProviders);
        }

        let mut names = HashSet::with_capacity(self.providers.len());
        if let Some(duplicate) = self.providers.iter().find(|p| !names.insert(p.name())) {
            return Err(PoolError::DuplicateProvider {
                name: duplicate.name().to_string(),
            });
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn StatsStore>);

        let mut retained = match store.load() {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load provider stats, starting fresh");
                BTreeMap::new()
            }
        };

        let mut restored = 0usize;
        for provider in &self.providers {
            if let Some(record) = retained.remove(provider.name()) {
                provider.stats().restore(record);
                restored += 1;
            }
        }

        tracing::info!(
            providers = self.providers.len(),
            restored,
            strategy = %self.strategy,
            "Provider pool ready"
        );

        Ok(ProviderPool {
            inner: Arc::new(PoolInner {
                providers: self.providers,
                strategy: self.strategy,
                cursor: Mutex::new(0),
                store,
                retained,
                save_lock: tokio::sync::Mutex::new(()),
                overall_deadline: self.overall_deadline,
            }),
        })
    }
}
