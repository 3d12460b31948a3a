//! Threshold decision labels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary decision for one scored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Potential fraud")]
    PotentialFraud,
    #[serde(rename = "Normal")]
    Normal,
}

impl Label {
    /// Label a probability against a threshold.
    ///
    /// Strictly greater than the threshold is "Potential fraud"; equality stays "Normal".
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Label::PotentialFraud
        } else {
            Label::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::PotentialFraud => "Potential fraud",
            Label::Normal => "Normal",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-label totals for a decision sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub potential_fraud: usize,
    pub normal: usize,
}

impl LabelCounts {
    pub fn from_labels(labels: &[Label]) -> Self {
        labels.iter().fold(Self::default(), |mut counts, label| {
            match label {
                Label::PotentialFraud => counts.potential_fraud += 1,
                Label::Normal => counts.normal += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.potential_fraud + self.normal
    }
}
