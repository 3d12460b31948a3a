//! Memoization of scoring calls keyed by payload content.
//!
//! Sound only under the assumption that the scoring service is a pure
//! function of its input: the same payload bytes always score the same.
//! That assumption is not verified.

use crate::error::PipelineError;
use crate::models::client::Scorer;
use crate::types::record::{PredictionResult, RequestPayload};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// SHA-256 of the serialized payload, hex encoded
pub fn payload_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Counters describing cache effectiveness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub lookups: u64,
    pub scorer_calls: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.lookups.saturating_sub(self.scorer_calls)
    }
}

/// Wraps a [`Scorer`] so that byte-identical payloads are scored at most once.
///
/// Entries live as long as the cache; there is no invalidation. Failed calls
/// leave no entry, so a later identical payload is submitted again. The cache
/// can be shared between sessions behind an `Arc`: concurrent lookups of the
/// same payload wait on one in-flight call.
pub struct RequestCache<S> {
    scorer: S,
    entries: Mutex<HashMap<String, Arc<OnceCell<PredictionResult>>>>,
    lookups: AtomicU64,
    scorer_calls: AtomicU64,
}

impl<S: Scorer> RequestCache<S> {
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            entries: Mutex::new(HashMap::new()),
            lookups: AtomicU64::new(0),
            scorer_calls: AtomicU64::new(0),
        }
    }

    /// Return the cached result for this payload, scoring it on first sight
    pub async fn predict(&self, payload: &RequestPayload) -> Result<PredictionResult, PipelineError> {
        let key = payload_digest(&payload.to_bytes()?);
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let cell = {
            let mut entries = self.entries.lock();
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if let Some(result) = cell.get() {
            debug!(digest = %key, records = payload.len(), "Scoring cache hit");
            return Ok(result.clone());
        }

        let outcome = cell
            .get_or_try_init(|| {
                let scorer = &self.scorer;
                let calls = &self.scorer_calls;
                let key = &key;
                async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    info!(digest = %key, records = payload.len(), "Scoring cache miss, calling service");
                    scorer.score(payload).await
                }
            })
            .await;

        match outcome {
            Ok(result) => Ok(result.clone()),
            Err(e) => {
                self.evict_unfilled(&key, &cell);
                Err(e)
            }
        }
    }

    /// Drop the slot a failed call left behind, unless a retry has filled it
    /// or a newer slot replaced it.
    fn evict_unfilled(&self, key: &str, cell: &Arc<OnceCell<PredictionResult>>) {
        let mut entries = self.entries.lock();
        let stale = entries
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            entries.remove(key);
            debug!(digest = %key, "Dropped cache slot after failed call");
        }
    }

    /// Number of payloads with a stored result
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            lookups: self.lookups.load(Ordering::Relaxed),
            scorer_calls: self.scorer_calls.load(Ordering::Relaxed),
        }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }
}

#[async_trait]
impl<S: Scorer> Scorer for RequestCache<S> {
    async fn score(&self, payload: &RequestPayload) -> Result<PredictionResult, PipelineError> {
        self.predict(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::CanonicalRecord;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Scorer that counts calls and returns 0.1 * position for each record
    #[derive(Default)]
    struct CountingScorer {
        calls: AtomicU64,
        fail: AtomicBool,
    }

    impl CountingScorer {
        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Scorer for CountingScorer {
        async fn score(&self, payload: &RequestPayload) -> Result<PredictionResult, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(PipelineError::http_status(503, "unavailable"));
            }
            Ok(PredictionResult::new(
                (0..payload.len()).map(|i| i as f64 * 0.1).collect(),
            ))
        }
    }

    fn payload(income: f64) -> RequestPayload {
        let mut record = CanonicalRecord::new();
        record.insert("device_os", "linux");
        record.insert("income", income);
        RequestPayload::new(vec![record.clone(), record])
    }

    #[test]
    fn test_digest_is_stable() {
        let a = payload_digest(&payload(0.3).to_bytes().unwrap());
        let b = payload_digest(&payload(0.3).to_bytes().unwrap());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_identical_payload_scored_once() {
        let cache = RequestCache::new(CountingScorer::default());

        let first = cache.predict(&payload(0.3)).await.unwrap();
        let second = cache.predict(&payload(0.3)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.scorer().calls(), 1);
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits(), 1);
    }

    #[tokio::test]
    async fn test_single_field_difference_is_a_miss() {
        let cache = RequestCache::new(CountingScorer::default());

        cache.predict(&payload(0.3)).await.unwrap();
        cache.predict(&payload(0.4)).await.unwrap();

        assert_eq!(cache.scorer().calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = RequestCache::new(CountingScorer::default());
        cache.scorer().fail.store(true, Ordering::SeqCst);

        assert!(cache.predict(&payload(0.3)).await.is_err());
        assert!(cache.is_empty());

        cache.scorer().fail.store(false, Ordering::SeqCst);
        let result = cache.predict(&payload(0.3)).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(cache.scorer().calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_calls_leave_no_slots() {
        let cache = RequestCache::new(CountingScorer::default());
        cache.scorer().fail.store(true, Ordering::SeqCst);

        for income in [0.1, 0.2, 0.3] {
            assert!(cache.predict(&payload(income)).await.is_err());
        }
        assert_eq!(cache.entries.lock().len(), 0);

        cache.scorer().fail.store(false, Ordering::SeqCst);
        cache.predict(&payload(0.1)).await.unwrap();
        assert_eq!(cache.entries.lock().len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_payloads_share_one_call() {
        let cache = Arc::new(RequestCache::new(CountingScorer::default()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.predict(&payload(0.5)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(cache.scorer().calls(), 1);
        assert_eq!(cache.stats().lookups, 8);
    }
}
