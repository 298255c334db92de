//! Shared-pool behaviour under concurrent callers and unreliable stores.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{failing, healthy, AttemptLog};
use genpool_core::{
    MemoryStore, ProviderPool, StatsDocument, StatsStore, StoreError, Strategy,
};
use pretty_assertions::assert_eq;

struct BrokenStore;

#[async_trait]
impl StatsStore for BrokenStore {
    fn load(&self) -> Result<StatsDocument, StoreError> {
        Err(serde_json::from_str::<StatsDocument>("{not json").unwrap_err().into())
    }

    async fn save(&self, _document: &StatsDocument) -> Result<(), StoreError> {
        Err(serde_json::from_str::<StatsDocument>("[").unwrap_err().into())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_keep_exact_counters() {
    let log = AttemptLog::new();
    let pool = ProviderPool::builder(Strategy::RoundRobin)
        .with_provider(failing("A", &log))
        .with_provider(healthy("B", &log, 1))
        .with_provider(healthy("C", &log, 1))
        .build()
        .unwrap();

    let calls = (0..60).map(|i| {
        let pool = pool.clone();
        tokio::spawn(async move { pool.generate(&format!("prompt {i}")).await })
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        assert!(result.unwrap().is_ok());
    }

    let stats = pool.stats();
    let a = stats.get("A").unwrap();
    let b = stats.get("B").unwrap();
    let c = stats.get("C").unwrap();

    assert_eq!(b.successful + c.successful, 60);
    assert_eq!(a.successful, 0);
    assert_eq!(b.failed + c.failed, 0);
    let total: u64 = stats.providers.iter().map(|p| p.stats.total_requests).sum();
    assert_eq!(total as usize, log.take().len());
    for record in [a, b, c] {
        assert_eq!(record.total_requests, record.successful + record.failed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_round_robin_spreads_concurrent_load() {
    let log = AttemptLog::new();
    let pool = ProviderPool::builder(Strategy::RoundRobin)
        .with_provider(healthy("A", &log, 1))
        .with_provider(healthy("B", &log, 1))
        .with_provider(healthy("C", &log, 1))
        .build()
        .unwrap();

    let calls = (0..30).map(|_| {
        let pool = pool.clone();
        async move { pool.generate("hola").await }
    });
    for result in futures::future::join_all(calls).await {
        assert!(result.is_ok());
    }

    // Each selection is one atomic cursor step, so load is exactly even
    for snapshot in pool.stats().providers {
        assert_eq!(snapshot.stats.successful, 10, "{}", snapshot.name);
    }
}

#[tokio::test]
async fn test_store_failures_never_reach_callers() {
    let log = AttemptLog::new();
    let pool = ProviderPool::builder(Strategy::FallbackOrder)
        .with_provider(healthy("A", &log, 1))
        .with_store(BrokenStore)
        .build()
        .unwrap();

    assert_eq!(pool.generate("hola").await.unwrap(), "A says hi");
    pool.flush_stats().await;
    assert_eq!(pool.stats().get("A").unwrap().successful, 1);
}

#[tokio::test]
async fn test_flush_writes_latest_snapshot() {
    let log = AttemptLog::new();
    let store = Arc::new(MemoryStore::new());
    let pool = ProviderPool::builder(Strategy::FallbackOrder)
        .with_provider(healthy("A", &log, 1))
        .with_shared_store(store.clone())
        .build()
        .unwrap();

    for _ in 0..5 {
        pool.generate("hola").await.unwrap();
    }
    pool.flush_stats().await;

    assert_eq!(store.document()["A"].successful, 5);
}
