//! Threshold classification of returned probabilities

use crate::types::decision::{Label, LabelCounts};

/// Lowest threshold offered to the user
pub const THRESHOLD_MIN: f64 = 0.0;
/// Highest threshold offered to the user
pub const THRESHOLD_MAX: f64 = 1.0;
/// Increment of the threshold input
pub const THRESHOLD_STEP: f64 = 0.05;
/// Threshold shown before the user touches the input
pub const THRESHOLD_DEFAULT: f64 = 0.0;

/// Whether `threshold` is one of the values the threshold input offers:
/// inside `[THRESHOLD_MIN, THRESHOLD_MAX]` and on a `THRESHOLD_STEP` increment.
pub fn is_offered_threshold(threshold: f64) -> bool {
    if !(THRESHOLD_MIN..=THRESHOLD_MAX).contains(&threshold) {
        return false;
    }
    let steps = (threshold - THRESHOLD_MIN) / THRESHOLD_STEP;
    (steps - steps.round()).abs() < 1e-9
}

/// Label every probability: "Potential fraud" iff `p > threshold`.
///
/// The threshold is expected in `[0.0, 1.0]` but is used exactly as given.
pub fn classify(probabilities: &[f64], threshold: f64) -> Vec<Label> {
    probabilities
        .iter()
        .map(|&p| Label::from_probability(p, threshold))
        .collect()
}

/// Classifier holding the caller's current threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdClassifier {
    threshold: f64,
}

impl ThresholdClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn classify(&self, probabilities: &[f64]) -> Vec<Label> {
        classify(probabilities, self.threshold)
    }

    /// Classify and count in one pass over the labels
    pub fn summarize(&self, probabilities: &[f64]) -> (Vec<Label>, LabelCounts) {
        let labels = self.classify(probabilities);
        let counts = LabelCounts::from_labels(&labels);
        (labels, counts)
    }
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self::new(THRESHOLD_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_strictly_above() {
        assert_eq!(
            classify(&[0.3, 0.5, 0.7], 0.5),
            vec![Label::Normal, Label::Normal, Label::PotentialFraud]
        );
    }

    #[test]
    fn test_boundary_is_normal() {
        assert_eq!(classify(&[0.5], 0.5), vec![Label::Normal]);
    }

    #[test]
    fn test_default_threshold_flags_any_positive() {
        let classifier = ThresholdClassifier::default();
        assert_eq!(classifier.threshold(), 0.0);
        assert_eq!(
            classifier.classify(&[0.0, 0.01]),
            vec![Label::Normal, Label::PotentialFraud]
        );
    }

    #[test]
    fn test_out_of_range_threshold_not_clamped() {
        assert_eq!(classify(&[1.0], 1.5), vec![Label::Normal]);
        assert_eq!(classify(&[0.0], -0.5), vec![Label::PotentialFraud]);
    }

    #[test]
    fn test_empty_input() {
        assert!(classify(&[], 0.5).is_empty());
    }

    #[test]
    fn test_summarize() {
        let mut classifier = ThresholdClassifier::new(0.2);
        classifier.set_threshold(0.6);
        let (labels, counts) = classifier.summarize(&[0.1, 0.65, 0.9]);
        assert_eq!(labels.len(), 3);
        assert_eq!(counts.potential_fraud, 2);
        assert_eq!(counts.normal, 1);
    }

    #[test]
    fn test_offered_thresholds() {
        assert!(is_offered_threshold(THRESHOLD_DEFAULT));
        assert!(is_offered_threshold(0.05));
        assert!(is_offered_threshold(0.7));
        assert!(is_offered_threshold(THRESHOLD_MAX));
        assert!(!is_offered_threshold(0.33));
        assert!(!is_offered_threshold(-0.05));
        assert!(!is_offered_threshold(1.05));
        assert!(!is_offered_threshold(f64::NAN));
    }
}
