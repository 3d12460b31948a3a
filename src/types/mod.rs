//! Type definitions for the inference request pipeline

pub mod decision;
pub mod record;

pub use decision::{Label, LabelCounts};
pub use record::{CanonicalRecord, PredictionResult, RequestPayload};
