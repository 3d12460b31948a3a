//! Statistics for scoring calls, cache effectiveness and decisions.

use crate::models::cache::CacheStats;
use crate::types::decision::LabelCounts;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept for percentile calculation
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the scoring client
pub struct ClientMetrics {
    /// Scoring attempts issued by the pipeline (cache hits included)
    pub requests: AtomicU64,
    /// Records submitted across all requests
    pub records_scored: AtomicU64,
    /// Requests that ended in an error
    pub failures: AtomicU64,
    /// Labels produced, by kind
    pub potential_fraud: AtomicU64,
    pub normal: AtomicU64,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            records_scored: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            potential_fraud: AtomicU64::new(0),
            normal: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed request and its probabilities
    pub fn record_request(&self, latency: Duration, probabilities: &[f64]) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.records_scored
            .fetch_add(probabilities.len() as u64, Ordering::Relaxed);

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }

        if let Ok(mut buckets) = self.score_buckets.write() {
            for &p in probabilities {
                let bucket = (p.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
                buckets[bucket] += 1;
            }
        }
    }

    pub fn record_failure(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one classification pass
    pub fn record_labels(&self, counts: &LabelCounts) {
        self.potential_fraud
            .fetch_add(counts.potential_fraud as u64, Ordering::Relaxed);
        self.normal.fetch_add(counts.normal as u64, Ordering::Relaxed);
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        let times = match self.latencies.read() {
            Ok(times) => times,
            Err(_) => return LatencyStats::default(),
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; 10])
    }

    /// Log summary statistics
    pub fn print_summary(&self, cache: Option<CacheStats>) {
        let requests = self.requests.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let records = self.records_scored.load(Ordering::Relaxed);
        let fraud = self.potential_fraud.load(Ordering::Relaxed);
        let normal = self.normal.load(Ordering::Relaxed);
        let latency = self.get_latency_stats();

        info!(
            requests = requests,
            failures = failures,
            records = records,
            uptime_s = self.start_time.elapsed().as_secs(),
            "Scoring summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Request latency"
        );
        if let Some(cache) = cache {
            info!(
                entries = cache.entries,
                lookups = cache.lookups,
                hits = cache.hits(),
                service_calls = cache.scorer_calls,
                "Request cache"
            );
        }
        info!(potential_fraud = fraud, normal = normal, "Decisions");

        let score_dist = self.get_score_distribution();
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request latency statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
