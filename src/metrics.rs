// Performance metrics module
//
// Provides lightweight counters for monitoring state propagation

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// State propagation metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// One instance may be shared by any number of managers and aggregators through an `Arc`;
/// counters can be logged periodically or on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Number of state transitions applied (no-op transitions excluded)
    pub state_updates: AtomicU64,

    /// Number of transitions delivered to at least one stream subscriber
    pub state_broadcasts: AtomicU64,

    /// Number of transitions emitted with no stream subscriber attached
    pub unobserved_updates: AtomicU64,

    /// Number of auto-hide timers started
    pub timers_started: AtomicU64,

    /// Number of auto-hide timers that fired and hid their state
    pub auto_hides: AtomicU64,

    /// Number of renderer frames drawn by presentation bridges
    pub renders: AtomicU64,

    /// Number of notifications a lagging renderer missed
    pub renders_skipped: AtomicU64,

    /// Creation time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            state_updates: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            unobserved_updates: AtomicU64::new(0),
            timers_started: AtomicU64::new(0),
            auto_hides: AtomicU64::new(0),
            renders: AtomicU64::new(0),
            renders_skipped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an applied state transition
    pub fn record_state_update(&self) {
        self.state_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transition delivered to stream subscribers
    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transition nobody was listening for
    pub fn record_unobserved_update(&self) {
        self.unobserved_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a started auto-hide timer
    pub fn record_timer_started(&self) {
        self.timers_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an auto-hide that fired
    pub fn record_auto_hide(&self) {
        self.auto_hides.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rendered frame
    pub fn record_render(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    /// Record notifications dropped for a lagging renderer
    pub fn record_renders_skipped(&self, count: u64) {
        self.renders_skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of started timers that ran to completion, in percent
    pub fn auto_hide_ratio(&self) -> f64 {
        let started = self.timers_started.load(Ordering::Relaxed);
        let fired = self.auto_hides.load(Ordering::Relaxed);
        if started > 0 {
            fired as f64 * 100.0 / started as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== State Propagation Metrics ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "State updates: {}, broadcasts: {}, unobserved: {}",
            self.state_updates.load(Ordering::Relaxed),
            self.state_broadcasts.load(Ordering::Relaxed),
            self.unobserved_updates.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Auto-hide timers: {} started, {} fired ({:.0}%)",
            self.timers_started.load(Ordering::Relaxed),
            self.auto_hides.load(Ordering::Relaxed),
            self.auto_hide_ratio()
        );
        tracing::info!(
            "Renders: {}, skipped while lagging: {}",
            self.renders.load(Ordering::Relaxed),
            self.renders_skipped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
