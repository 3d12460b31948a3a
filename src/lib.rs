//! Credit Default Client Library
//!
//! Normalizes manual form entries and uploaded batch files into the
//! scoring service's input schema, submits each distinct payload once,
//! and classifies the returned default/fraud probabilities against a
//! caller-chosen threshold.

pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use error::PipelineError;
pub use loader::{Batch, BatchLoader, ContentType};
pub use metrics::ClientMetrics;
pub use models::{classify, PredictionClient, RequestCache, Scorer, ThresholdClassifier};
pub use normalizer::RecordSource;
pub use pipeline::{InferencePipeline, Scored};
pub use schema::{FormState, FormValue, YesNo};
pub use types::{CanonicalRecord, Label, PredictionResult, RequestPayload};
