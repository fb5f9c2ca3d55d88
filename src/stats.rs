//! Local collection statistics.
//!
//! Counts what the collector has seen and sent during this process
//! lifetime. Everything here is local bookkeeping: none of these counters
//! are transmitted, including the conversion funnel step counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Counters for the current collector instance.
#[derive(Debug)]
pub struct CollectorStats {
    visits: AtomicU64,
    clicks: AtomicU64,
    custom_events: AtomicU64,
    conversions: AtomicU64,
    heatmap_clicks: AtomicU64,
    events_queued: AtomicU64,
    batches_flushed: AtomicU64,
    delivered: AtomicU64,
    delivery_failures: AtomicU64,
    discarded: AtomicU64,
    /// Funnel position; incremented per conversion, never sent.
    conversion_step: AtomicU32,
    started_at: DateTime<Utc>,
}

impl CollectorStats {
    pub fn new() -> Self {
        Self {
            visits: AtomicU64::new(0),
            clicks: AtomicU64::new(0),
            custom_events: AtomicU64::new(0),
            conversions: AtomicU64::new(0),
            heatmap_clicks: AtomicU64::new(0),
            events_queued: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            conversion_step: AtomicU32::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_visit(&self) {
        self.visits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_click(&self) {
        self.clicks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_custom_event(&self) {
        self.custom_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heatmap_click(&self) {
        self.heatmap_clicks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.events_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_flushed(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Advance the conversion funnel and return the new step number.
    pub fn next_conversion_step(&self) -> u32 {
        self.conversions.fetch_add(1, Ordering::Relaxed);
        self.conversion_step.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current funnel position (0 before the first conversion).
    pub fn conversion_step(&self) -> u32 {
        self.conversion_step.load(Ordering::Relaxed)
    }

    /// Snapshot of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            visits: self.visits.load(Ordering::Relaxed),
            clicks: self.clicks.load(Ordering::Relaxed),
            custom_events: self.custom_events.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
            heatmap_clicks: self.heatmap_clicks.load(Ordering::Relaxed),
            events_queued: self.events_queued.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            conversion_step: self.conversion_step.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for display.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Collector statistics:\n\
             - Page visits tracked: {}\n\
             - Clicks tracked: {}\n\
             - Custom events: {}\n\
             - Conversions: {} (funnel step {})\n\
             - Heatmap clicks sampled: {}\n\
             - Events queued pre-consent: {}\n\
             - Batches flushed: {}\n\
             - Deliveries: {} ok, {} failed\n\
             - Events discarded: {}\n\
             - Uptime: {} seconds",
            s.visits,
            s.clicks,
            s.custom_events,
            s.conversions,
            s.conversion_step,
            s.heatmap_clicks,
            s.events_queued,
            s.batches_flushed,
            s.delivered,
            s.delivery_failures,
            s.discarded,
            s.uptime_secs
        )
    }
}

impl Default for CollectorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of [`CollectorStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub visits: u64,
    pub clicks: u64,
    pub custom_events: u64,
    pub conversions: u64,
    pub heatmap_clicks: u64,
    pub events_queued: u64,
    pub batches_flushed: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
    pub discarded: u64,
    pub conversion_step: u32,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}
