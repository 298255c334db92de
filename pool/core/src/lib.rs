//! genpool core - Multi-Provider Text Generation Pool
//!
//! A single `generate(prompt)` entry point in front of several independently
//! configured text generation providers. The pool picks a provider with a
//! pluggable strategy, fails over to the next one when an attempt fails,
//! and keeps per-provider latency and reliability stats that survive
//! restarts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ProviderPool                          │
//! │                                                               │
//! │   generate(prompt) ──► Strategy::select ──► Provider::attempt │
//! │          ▲                  │    ▲                 │          │
//! │          │   next provider  │    │ stats snapshot  │          │
//! │          └──────────────────┘    └─── ProviderStats ◄┘        │
//! │                                           │                   │
//! │                                     StatsStore (JSON)         │
//! └───────────────────────────────────────────┼───────────────────┘
//!                                             │
//!           ┌──────────────────────┬──────────┴───────────┐
//!           │  ChatCompletionBackend │     GeminiBackend    │
//!           │  (Groq, xAI, OpenAI)   │  (generateContent)   │
//!           └────────────────────────┴──────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use genpool_core::{config::load_config, ProviderPool};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let pool = ProviderPool::from_config(&config)?;
//!
//!     let text = pool.generate("Resume el inventario de hoy").await?;
//!     println!("{text}");
//!
//!     pool.flush_stats().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: TOML and environment configuration, provider discovery
//! - [`error`]: Provider, pool, and store error types
//! - [`pool`]: The pool and its builder
//! - [`provider`]: Provider adapters and HTTP backends
//! - [`stats`]: Per-provider counters and their persistence
//! - [`strategy`]: Selection strategies

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod pool;
pub mod provider;
pub mod stats;
pub mod strategy;

// Re-exports for convenience
pub use config::{ConfigError, ConfigOverrides, ConfigSource, PoolConfig, ProviderConfig};
pub use error::{PoolError, ProviderError, ProviderErrorKind, StoreError};
pub use pool::{PoolBuilder, PoolStats, ProviderPool, ProviderSnapshot};
pub use provider::{
    Backend, BackendKind, BackendSettings, ChatCompletionBackend, Completion, GeminiBackend,
    Provider,
};
pub use stats::{JsonFileStore, MemoryStore, StatsDocument, StatsRecord, StatsStore};
pub use strategy::{ExclusionSet, ParseStrategyError, Strategy};
