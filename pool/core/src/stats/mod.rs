//! Provider Statistics
//!
//! Per-provider performance counters and their durable storage.
//!
//! Every attempt folds into exactly one [`StatsRecord`] update, under the
//! provider's own lock, so concurrent callers never lose an increment and the
//! running average always covers every completed success exactly once.
//!
//! Invariant: when `successful > 0`, `avg_latency_ms == total_latency_ms /
//! successful`. Failures never touch the latency sum.

mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use store::{JsonFileStore, MemoryStore, StatsStore};

/// Persisted stats table, keyed by provider name
pub type StatsDocument = BTreeMap<String, StatsRecord>;

// ============================================================================
// Stats Record
// ============================================================================

/// Rolling performance counters for one provider
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsRecord {
    /// Attempts routed to this provider
    pub total_requests: u64,
    /// Attempts that produced text
    pub successful: u64,
    /// Attempts that failed for any reason
    pub failed: u64,
    /// Latency sum over successful attempts only
    pub total_latency_ms: f64,
    /// `total_latency_ms / successful`, zero without history
    pub avg_latency_ms: f64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// When the provider was last attempted
    #[serde(with = "iso8601")]
    pub last_used: Option<DateTime<Utc>>,
}

impl StatsRecord {
    /// Fold a successful attempt into the record
    pub fn record_success(&mut self, latency_ms: f64, at: DateTime<Utc>) {
        self.total_requests += 1;
        self.last_used = Some(at);
        self.successful += 1;
        self.total_latency_ms += latency_ms;
        self.avg_latency_ms = self.total_latency_ms / self.successful as f64;
    }

    /// Fold a failed attempt into the record
    pub fn record_failure(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.total_requests += 1;
        self.last_used = Some(at);
        self.failed += 1;
        self.last_error = Some(message.into());
    }

    /// Whether the provider has any latency history to rank by
    #[must_use]
    pub fn has_latency_history(&self) -> bool {
        self.successful > 0
    }

    /// Re-derive the average so a loaded record honours the invariant
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.avg_latency_ms = if self.successful > 0 {
            self.total_latency_ms / self.successful as f64
        } else {
            0.0
        };
        self
    }
}

// ============================================================================
// Provider Stats Cell
// ============================================================================

/// Lock-guarded stats record owned by one provider
#[derive(Debug, Default)]
pub struct ProviderStats {
    record: Mutex<StatsRecord>,
}

impl ProviderStats {
    /// Create zeroed stats
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a success at the current time
    pub fn record_success(&self, latency_ms: f64) {
        self.record.lock().record_success(latency_ms, Utc::now());
    }

    /// Record a failure at the current time
    pub fn record_failure(&self, message: impl Into<String>) {
        self.record.lock().record_failure(message, Utc::now());
    }

    /// Copy of the current record
    #[must_use]
    pub fn snapshot(&self) -> StatsRecord {
        self.record.lock().clone()
    }

    /// Overwrite the record with persisted history
    pub fn restore(&self, record: StatsRecord) {
        *self.record.lock() = record.normalized();
    }
}

// ============================================================================
// Timestamp Format
// ============================================================================

/// ISO-8601 timestamps.
///
/// Writes RFC 3339 in UTC. Reads RFC 3339, and also zone-less ISO-8601
/// (`2024-05-01T10:00:00.123456`), which older documents contain; those are
/// taken as UTC.
mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(at.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}
