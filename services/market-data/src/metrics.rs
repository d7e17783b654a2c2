//! Observability counters for the feed pipeline
//!
//! Lock-free counters covering the tick loop, delta emission, and the
//! dispatch gates. Exposed as a JSON snapshot on the stats route.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Core metrics for the feed service.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    // Simulation
    pub ticks: AtomicU64,
    pub tick_errors: AtomicU64,

    // Delta engine
    pub deltas_emitted: AtomicU64,

    // Dispatch gates
    pub updates_sent: AtomicU64,
    pub drops_bucket: AtomicU64,
    pub drops_pacing: AtomicU64,
    pub drops_filter: AtomicU64,
    pub drops_transport: AtomicU64,

    // Sessions
    pub sessions_connected: AtomicU64,
    pub sessions_disconnected: AtomicU64,
}

/// Point-in-time copy for the stats route.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub tick_errors: u64,
    pub deltas_emitted: u64,
    pub updates_sent: u64,
    pub drops_bucket: u64,
    pub drops_pacing: u64,
    pub drops_filter: u64,
    pub drops_transport: u64,
    pub sessions_connected: u64,
    pub sessions_disconnected: u64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_error(&self) {
        self.tick_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delta(&self) {
        self.deltas_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.updates_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop_bucket(&self) {
        self.drops_bucket.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop_pacing(&self) {
        self.drops_pacing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop_filter(&self) {
        self.drops_filter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop_transport(&self) {
        self.drops_transport.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_connected(&self) {
        self.sessions_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_disconnected(&self) {
        self.sessions_disconnected.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            tick_errors: self.tick_errors.load(Ordering::Relaxed),
            deltas_emitted: self.deltas_emitted.load(Ordering::Relaxed),
            updates_sent: self.updates_sent.load(Ordering::Relaxed),
            drops_bucket: self.drops_bucket.load(Ordering::Relaxed),
            drops_pacing: self.drops_pacing.load(Ordering::Relaxed),
            drops_filter: self.drops_filter.load(Ordering::Relaxed),
            drops_transport: self.drops_transport.load(Ordering::Relaxed),
            sessions_connected: self.sessions_connected.load(Ordering::Relaxed),
            sessions_disconnected: self.sessions_disconnected.load(Ordering::Relaxed),
        }
    }
}
