//! Inference request pipeline: records in, probabilities and labels out.

use crate::error::PipelineError;
use crate::metrics::ClientMetrics;
use crate::models::classifier::ThresholdClassifier;
use crate::models::client::Scorer;
use crate::normalizer::RecordSource;
use crate::types::decision::{Label, LabelCounts};
use crate::types::record::RequestPayload;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Probabilities for one submission and their labels at a threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored {
    pub probabilities: Vec<f64>,
    pub labels: Vec<Label>,
    pub threshold: f64,
    pub scored_at: DateTime<Utc>,
}

impl Scored {
    /// Relabel the same probabilities at another threshold. No request is made.
    pub fn reclassify(&self, threshold: f64) -> Scored {
        Scored {
            probabilities: self.probabilities.clone(),
            labels: ThresholdClassifier::new(threshold).classify(&self.probabilities),
            threshold,
            scored_at: self.scored_at,
        }
    }

    pub fn counts(&self) -> LabelCounts {
        LabelCounts::from_labels(&self.labels)
    }

    /// `(probability, label)` pairs in submission order
    pub fn rows(&self) -> impl Iterator<Item = (f64, Label)> + '_ {
        self.probabilities
            .iter()
            .copied()
            .zip(self.labels.iter().copied())
    }
}

/// Ties a record source to a scorer (usually a [`RequestCache`]) and a classifier.
///
/// [`RequestCache`]: crate::models::cache::RequestCache
pub struct InferencePipeline<S> {
    scorer: S,
    classifier: ThresholdClassifier,
    metrics: Arc<ClientMetrics>,
}

impl<S: Scorer> InferencePipeline<S> {
    pub fn new(scorer: S, threshold: f64) -> Self {
        Self {
            scorer,
            classifier: ThresholdClassifier::new(threshold),
            metrics: Arc::new(ClientMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.classifier.threshold()
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.classifier.set_threshold(threshold);
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    /// Normalize the source, score it, and label the result.
    ///
    /// Any failure aborts the whole submission; no partial results.
    pub async fn score<R>(&self, source: &R) -> Result<Scored, PipelineError>
    where
        R: RecordSource + ?Sized,
    {
        let records = source.records()?;
        if records.is_empty() {
            return Err(PipelineError::invalid_field("data", "contains no records to score"));
        }

        let payload = RequestPayload::new(records);
        let start = Instant::now();

        let result = match self.scorer.score(&payload).await {
            Ok(result) => result,
            Err(e) => {
                self.metrics.record_failure();
                error!(records = payload.len(), error = %e, "Scoring failed");
                return Err(e);
            }
        };

        self.metrics.record_request(start.elapsed(), result.probabilities());

        let (labels, counts) = self.classifier.summarize(result.probabilities());
        self.metrics.record_labels(&counts);

        debug!(
            records = payload.len(),
            threshold = self.classifier.threshold(),
            potential_fraud = counts.potential_fraud,
            normal = counts.normal,
            "Submission scored"
        );

        Ok(Scored {
            probabilities: result.into_inner(),
            labels,
            threshold: self.classifier.threshold(),
            scored_at: Utc::now(),
        })
    }
}
