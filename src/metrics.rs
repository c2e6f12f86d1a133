//! Engine counters for the completion pipeline
//!
//! Each [`BucketStore`](crate::dictionary::BucketStore) owns one
//! [`EngineMetrics`] instance; the resolver, provider and retrigger controller
//! share it through the store. There is no process-wide registry: two editing
//! sessions never see each other's numbers.
//!
//! ## Tracked
//!
//! - Shard fetches, retries, final load failures
//! - Cache hits and coalesced waits on in-flight loads
//! - Resolutions, stale discards, cancelled requests
//! - Redisplay requests and redisplays suppressed by the fingerprint check
//!
//! Counters are lock-free atomics; timings live in a `DashMap`. Each
//! operation keeps running totals plus the newest [`MAX_TIMING_SAMPLES`]
//! durations, so memory stays flat however long the server runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

/// Durations kept per operation for percentiles
pub const MAX_TIMING_SAMPLES: usize = 1024;

/// Running totals plus a window of recent samples, in microseconds
#[derive(Debug, Default)]
struct OperationTimings {
    count: u64,
    total: u64,
    min: u64,
    max: u64,
    recent: VecDeque<u64>,
}

impl OperationTimings {
    fn record(&mut self, micros: u64) {
        if self.count == 0 {
            self.min = micros;
            self.max = micros;
        } else {
            self.min = self.min.min(micros);
            self.max = self.max.max(micros);
        }
        self.count += 1;
        self.total = self.total.saturating_add(micros);

        if self.recent.len() == MAX_TIMING_SAMPLES {
            self.recent.pop_front();
        }
        self.recent.push_back(micros);
    }
}

/// Counter registry for one completion engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    // Bucket store
    shard_fetches: AtomicU64,
    shard_retries: AtomicU64,
    load_failures: AtomicU64,
    cache_hits: AtomicU64,
    coalesced_waits: AtomicU64,
    rejected_keys: AtomicU64,

    // Resolution
    resolutions: AtomicU64,
    stale_discards: AtomicU64,
    cancelled_requests: AtomicU64,
    transient_retries: AtomicU64,

    // Retrigger
    redisplays: AtomicU64,
    suppressed_redisplays: AtomicU64,

    // Operation name -> timings
    operation_timings: DashMap<&'static str, OperationTimings>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one underlying shard fetch (initial or retry)
    pub fn record_shard_fetch(&self) {
        self.shard_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shard_retry(&self) {
        self.shard_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a caller that attached to an already running load
    pub fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_key(&self) {
        self.rejected_keys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_discard(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled_request(&self) {
        self.cancelled_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_retry(&self) {
        self.transient_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redisplay(&self) {
        self.redisplays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed_redisplay(&self) {
        self.suppressed_redisplays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn shard_fetches(&self) -> u64 {
        self.shard_fetches.load(Ordering::Relaxed)
    }

    pub fn shard_retries(&self) -> u64 {
        self.shard_retries.load(Ordering::Relaxed)
    }

    /// Records the timing of an operation
    pub fn record_timing(&self, operation: &'static str, duration: Duration) {
        let micros = duration.as_micros() as u64;
        self.operation_timings
            .entry(operation)
            .or_default()
            .record(micros);
    }

    /// Starts a guard that records the elapsed time of `operation` when dropped
    pub fn time(&self, operation: &'static str) -> TimingGuard<'_> {
        TimingGuard {
            metrics: self,
            operation,
            start: Instant::now(),
        }
    }

    /// Gets summary statistics for an operation.
    ///
    /// Count, min, max and mean cover every sample; percentiles cover the
    /// retained window.
    pub fn operation_stats(&self, operation: &str) -> Option<OperationStats> {
        let timings = self.operation_timings.get(operation)?;
        if timings.count == 0 {
            return None;
        }

        let mut sorted: Vec<u64> = timings.recent.iter().copied().collect();
        sorted.sort_unstable();
        let window = sorted.len();
        let p95_idx = (window as f64 * 0.95) as usize;

        Some(OperationStats {
            count: timings.count,
            min_micros: timings.min,
            max_micros: timings.max,
            mean_micros: timings.total / timings.count,
            p50_micros: sorted[window / 2],
            p95_micros: sorted[p95_idx.min(window - 1)],
        })
    }

    /// Number of samples currently held for `operation`
    pub fn retained_samples(&self, operation: &str) -> usize {
        self.operation_timings
            .get(operation)
            .map_or(0, |timings| timings.recent.len())
    }

    /// Resets every counter and timing
    pub fn reset(&self) {
        for counter in [
            &self.shard_fetches,
            &self.shard_retries,
            &self.load_failures,
            &self.cache_hits,
            &self.coalesced_waits,
            &self.rejected_keys,
            &self.resolutions,
            &self.stale_discards,
            &self.cancelled_requests,
            &self.transient_retries,
            &self.redisplays,
            &self.suppressed_redisplays,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.operation_timings.clear();
    }

    /// Point-in-time copy of every counter
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            shard_fetches: self.shard_fetches.load(Ordering::Relaxed),
            shard_retries: self.shard_retries.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            rejected_keys: self.rejected_keys.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
            cancelled_requests: self.cancelled_requests.load(Ordering::Relaxed),
            transient_retries: self.transient_retries.load(Ordering::Relaxed),
            redisplays: self.redisplays.load(Ordering::Relaxed),
            suppressed_redisplays: self.suppressed_redisplays.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for a single operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub min_micros: u64,
    pub max_micros: u64,
    pub mean_micros: u64,
    pub p50_micros: u64,
    pub p95_micros: u64,
}

/// Summary of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSummary {
    pub shard_fetches: u64,
    pub shard_retries: u64,
    pub load_failures: u64,
    pub cache_hits: u64,
    pub coalesced_waits: u64,
    pub rejected_keys: u64,
    pub resolutions: u64,
    pub stale_discards: u64,
    pub cancelled_requests: u64,
    pub transient_retries: u64,
    pub redisplays: u64,
    pub suppressed_redisplays: u64,
}

/// RAII guard returned by [`EngineMetrics::time`]
pub struct TimingGuard<'a> {
    metrics: &'a EngineMetrics,
    operation: &'static str,
    start: Instant,
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record_timing(self.operation, self.start.elapsed());
    }
}
