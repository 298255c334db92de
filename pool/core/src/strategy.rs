//! Selection Strategies
//!
//! Decides which provider gets the next attempt. Strategies are pure: they
//! look at providers in registration order (by index), the providers already
//! tried in this call, the shared rotation cursor, and a stats snapshot, and
//! return one eligible index or `None`.
//!
//! # Strategies
//!
//! ```text
//! fallback     [A, B, C]  ->  first untried in registration order
//! round_robin  [A, B, C]  ->  first untried at or after the cursor
//! fastest      [A, B, C]  ->  lowest average latency, untested last
//! ```
//!
//! # Cursor Semantics
//!
//! The round-robin cursor is shared across calls and only moves under the
//! caller's lock. A scan starts at the cursor and advances it once per
//! provider inspected, excluded or not, so after a selection it points one
//! past the chosen provider. A selection is therefore a single atomic step
//! on the cursor, and interleaved callers see a strict rotation order.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::StatsRecord;

/// Providers already attempted in the current call, by index
pub type ExclusionSet = HashSet<usize>;

/// Pluggable provider selection policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// First untried provider in registration order
    #[serde(rename = "fallback", alias = "fallback_order")]
    FallbackOrder,
    /// Rotate through providers across calls
    #[serde(rename = "round_robin")]
    RoundRobin,
    /// Lowest average latency first
    #[default]
    #[serde(rename = "fastest", alias = "fastest_first")]
    FastestFirst,
}

impl Strategy {
    /// Stable identifier used in config and stats output
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FallbackOrder => "fallback",
            Self::RoundRobin => "round_robin",
            Self::FastestFirst => "fastest",
        }
    }

    /// Pick the next provider to try.
    ///
    /// `stats` holds one record per provider in registration order.
    /// `cursor` is only read and advanced by [`Strategy::RoundRobin`].
    #[must_use]
    pub fn select(
        self,
        stats: &[StatsRecord],
        excluded: &ExclusionSet,
        cursor: &mut usize,
    ) -> Option<usize> {
        match self {
            Self::FallbackOrder => first_eligible(stats.len(), excluded),
            Self::RoundRobin => round_robin(stats.len(), excluded, cursor),
            Self::FastestFirst => rank_fastest(stats, excluded).first().copied(),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown strategy name
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown strategy '{0}' (expected fallback, round_robin or fastest)")]
pub struct ParseStrategyError(pub String);

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fallback" | "fallback_order" => Ok(Self::FallbackOrder),
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "fastest" | "fastest_first" => Ok(Self::FastestFirst),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

// ============================================================================
// Strategy Implementations
// ============================================================================

fn first_eligible(count: usize, excluded: &ExclusionSet) -> Option<usize> {
    (0..count).find(|index| !excluded.contains(index))
}

fn round_robin(count: usize, excluded: &ExclusionSet, cursor: &mut usize) -> Option<usize> {
    if count == 0 {
        return None;
    }

    for _ in 0..count {
        let index = *cursor % count;
        *cursor = (index + 1) % count;
        if !excluded.contains(&index) {
            return Some(index);
        }
    }

    // Full lap without a hit; the linear scan agrees unless state is corrupt
    first_eligible(count, excluded)
}

/// Eligible providers ordered fastest first.
///
/// Providers with latency history sort ascending by average latency;
/// providers without history follow. Ties keep registration order.
#[must_use]
pub fn rank_fastest(stats: &[StatsRecord], excluded: &ExclusionSet) -> Vec<usize> {
    let mut eligible: Vec<usize> = (0..stats.len())
        .filter(|index| !excluded.contains(index))
        .collect();

    // Stable sort keeps registration order among equal keys
    eligible.sort_by(|&a, &b| latency_key(&stats[a]).total_cmp(&latency_key(&stats[b])));
    eligible
}

fn latency_key(record: &StatsRecord) -> f64 {
    if record.has_latency_history() {
        record.avg_latency_ms
    } else {
        f64::INFINITY
    }
}
