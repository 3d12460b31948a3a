//! Scoring components: service client, request cache and threshold classifier

pub mod cache;
pub mod classifier;
pub mod client;

pub use cache::{CacheStats, RequestCache};
pub use classifier::{classify, ThresholdClassifier};
pub use client::{PredictionClient, Scorer};
