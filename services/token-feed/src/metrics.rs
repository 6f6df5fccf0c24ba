//! Ingestion metrics for the token feed core
//!
//! Lock-free counters shared by the producers. Exported as a sorted map so
//! the gateway can expose them without knowing the individual fields.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Core metrics for the token feed.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    // Stream
    pub messages_received: AtomicU64,
    pub messages_discarded: AtomicU64,
    pub stream_upserts: AtomicU64,
    pub connect_attempts: AtomicU64,
    pub reconnects_scheduled: AtomicU64,

    // Poller
    pub poll_cycles: AtomicU64,
    pub poll_upserts: AtomicU64,
    pub poll_failures: AtomicU64,
    pub last_poll_duration_ms: AtomicU64,

    // Enrichment
    pub images_patched: AtomicU64,
    pub enrich_failures: AtomicU64,

    // Store
    pub evicted_capacity: AtomicU64,
    pub evicted_expired: AtomicU64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a text frame received from the feed.
    pub fn record_message(&self, accepted: bool) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        if accepted {
            self.stream_upserts.fetch_add(1, Ordering::Relaxed);
        } else {
            self.messages_discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed poll cycle.
    pub fn record_poll(&self, upserts: usize, duration_ms: u64) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
        self.poll_upserts.fetch_add(upserts as u64, Ordering::Relaxed);
        self.last_poll_duration_ms.store(duration_ms, Ordering::Relaxed);
    }

    pub fn record_poll_failure(&self) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrichment(&self, patched: bool) {
        if patched {
            self.images_patched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.enrich_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_capacity_evictions(&self, count: usize) {
        if count > 0 {
            self.evicted_capacity.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_expired(&self, count: usize) {
        if count > 0 {
            self.evicted_expired.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Export metrics as a BTreeMap for exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let counters = [
            ("messages_received", &self.messages_received),
            ("messages_discarded", &self.messages_discarded),
            ("stream_upserts", &self.stream_upserts),
            ("connect_attempts", &self.connect_attempts),
            ("reconnects_scheduled", &self.reconnects_scheduled),
            ("poll_cycles", &self.poll_cycles),
            ("poll_upserts", &self.poll_upserts),
            ("poll_failures", &self.poll_failures),
            ("last_poll_duration_ms", &self.last_poll_duration_ms),
            ("images_patched", &self.images_patched),
            ("enrich_failures", &self.enrich_failures),
            ("evicted_capacity", &self.evicted_capacity),
            ("evicted_expired", &self.evicted_expired),
        ];

        counters
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.load(Ordering::Relaxed)))
            .collect()
    }
}
