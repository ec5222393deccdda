// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Engine metrics
//!
//! Passive counters only: nothing in the engine takes decisions based on
//! these values. One instance per client, injected where needed; the hot
//! path is atomic increments, the usage distribution sits behind a mutex
//! touched only on relay selection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use outpost::RelayUrl;

/// Engine metrics
#[derive(Debug, Default)]
pub struct Metrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fetches_succeeded: AtomicU64,
    fetches_timed_out: AtomicU64,
    fetches_no_relays: AtomicU64,
    fetch_latency_ms: AtomicU64,
    subscriptions_calculated: AtomicU64,
    relays_added_dynamically: AtomicU64,
    relay_usage: Mutex<HashMap<RelayUrl, u64>>,
}

impl Metrics {
    /// New metrics instance
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_success(&self, latency: Duration) {
        self.fetches_succeeded.fetch_add(1, Ordering::Relaxed);
        self.fetch_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_timeout(&self) {
        self.fetches_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_no_relays(&self) {
        self.fetches_no_relays.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_subscription_calculated(&self) {
        self.subscriptions_calculated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relay_added_dynamically(&self) {
        self.relays_added_dynamically.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relay_usage(&self, url: &RelayUrl) {
        let mut usage = self.relay_usage.lock().unwrap_or_else(|e| e.into_inner());
        *usage.entry(url.clone()).or_insert(0) += 1;
    }

    /// Take a consistent snapshot of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let relay_usage: HashMap<RelayUrl, u64> = self
            .relay_usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            fetches_timed_out: self.fetches_timed_out.load(Ordering::Relaxed),
            fetches_no_relays: self.fetches_no_relays.load(Ordering::Relaxed),
            fetch_latency_ms: self.fetch_latency_ms.load(Ordering::Relaxed),
            subscriptions_calculated: self.subscriptions_calculated.load(Ordering::Relaxed),
            relays_added_dynamically: self.relays_added_dynamically.load(Ordering::Relaxed),
            relay_usage,
        }
    }

    /// Zero every counter and clear the usage distribution
    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.fetches_succeeded.store(0, Ordering::Relaxed);
        self.fetches_timed_out.store(0, Ordering::Relaxed);
        self.fetches_no_relays.store(0, Ordering::Relaxed);
        self.fetch_latency_ms.store(0, Ordering::Relaxed);
        self.subscriptions_calculated.store(0, Ordering::Relaxed);
        self.relays_added_dynamically.store(0, Ordering::Relaxed);
        self.relay_usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Point-in-time view of the engine metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Relay list cache hits
    pub cache_hits: u64,
    /// Relay list cache misses
    pub cache_misses: u64,
    /// Relay list fetches that returned a list
    pub fetches_succeeded: u64,
    /// Relay list fetches that timed out
    pub fetches_timed_out: u64,
    /// Relay list fetches skipped because no relay was available
    pub fetches_no_relays: u64,
    /// Total latency of successful fetches, in milliseconds
    pub fetch_latency_ms: u64,
    /// Relay sets calculated for subscriptions
    pub subscriptions_calculated: u64,
    /// Relays added to live subscriptions after late relay-list discovery
    pub relays_added_dynamically: u64,
    /// How many times each relay was selected
    pub relay_usage: HashMap<RelayUrl, u64>,
}

impl MetricsSnapshot {
    /// Cache hit rate in `[0.0, 1.0]`; `0.0` when nothing was looked up yet
    pub fn cache_hit_rate(&self) -> f64 {
        let total: u64 = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Average latency of successful fetches
    pub fn average_fetch_latency(&self) -> Option<Duration> {
        if self.fetches_succeeded == 0 {
            None
        } else {
            Some(Duration::from_millis(
                self.fetch_latency_ms / self.fetches_succeeded,
            ))
        }
    }

    /// The `n` most used relays, by selection count
    pub fn top_relays(&self, n: usize) -> Vec<(RelayUrl, u64)> {
        let mut usage: Vec<(RelayUrl, u64)> = self
            .relay_usage
            .iter()
            .map(|(url, count)| (url.clone(), *count))
            .collect();
        usage.sort_by(|(a_url, a), (b_url, b)| b.cmp(a).then_with(|| a_url.cmp(b_url)));
        usage.truncate(n);
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let metrics = Metrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_misses, 1);
        assert!((snapshot.cache_hit_rate() - 0.75).abs() < f64::EPSILON);

        // Empty metrics don't divide by zero
        assert_eq!(MetricsSnapshot::default().cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_average_latency() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().average_fetch_latency(), None);

        metrics.record_fetch_success(Duration::from_millis(100));
        metrics.record_fetch_success(Duration::from_millis(300));
        assert_eq!(
            metrics.snapshot().average_fetch_latency(),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn test_top_relays() {
        let metrics = Metrics::new();
        let a = RelayUrl::parse("wss://a.example.com").unwrap();
        let b = RelayUrl::parse("wss://b.example.com").unwrap();

        metrics.record_relay_usage(&a);
        metrics.record_relay_usage(&b);
        metrics.record_relay_usage(&b);

        let top = metrics.snapshot().top_relays(1);
        assert_eq!(top, vec![(b, 2)]);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_cache_hit();
        metrics.record_fetch_success(Duration::from_millis(10));
        metrics.record_relay_usage(&RelayUrl::parse("wss://a.example.com").unwrap());
        metrics.record_subscription_calculated();

        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert!(snapshot.relay_usage.is_empty());
    }
}
