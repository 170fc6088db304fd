// Run metrics module
//
// Lightweight counters for what the clicker loop did during a session

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session metrics
///
/// Uses atomic operations so the loop task and the console can share one
/// instance without locks. Logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Loop cycles completed
    pub cycles: AtomicU64,

    /// Cycles where a template reached the threshold
    pub matches: AtomicU64,

    /// Clicks performed
    pub clicks: AtomicU64,

    /// Cycles that found nothing, or had no templates
    pub idle_cycles: AtomicU64,

    /// Screen captures that failed
    pub capture_failures: AtomicU64,

    /// Pointer moves or clicks that failed
    pub input_failures: AtomicU64,

    /// Time spent scoring templates, in microseconds
    pub total_match_time_us: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            matches: AtomicU64::new(0),
            clicks: AtomicU64::new(0),
            idle_cycles: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
            input_failures: AtomicU64::new(0),
            total_match_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_click(&self) {
        self.clicks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_cycle(&self) {
        self.idle_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_input_failure(&self) {
        self.input_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long one `find_best` pass took
    pub fn record_match_time(&self, duration: Duration) {
        self.total_match_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average matching time per cycle in milliseconds
    pub fn avg_match_time_ms(&self) -> f64 {
        let total = self.total_match_time_us.load(Ordering::Relaxed);
        let count = self.cycles.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64 / 1000.0
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Cycles: {} ({} matched, {} idle)",
            self.cycles.load(Ordering::Relaxed),
            self.matches.load(Ordering::Relaxed),
            self.idle_cycles.load(Ordering::Relaxed)
        );
        tracing::info!("Clicks: {}", self.clicks.load(Ordering::Relaxed));
        tracing::info!(
            "Failures: {} capture, {} input",
            self.capture_failures.load(Ordering::Relaxed),
            self.input_failures.load(Ordering::Relaxed)
        );
        tracing::info!("Average match time: {:.2}ms per cycle", self.avg_match_time_ms());
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
