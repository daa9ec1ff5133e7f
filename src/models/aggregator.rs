//! Multi-view aggregation of class probabilities

use crate::error::AnalysisError;
use crate::types::{AnalysisResult, ClassProbabilities, NUM_CLASSES};

/// Combines per-view class probabilities into a single decision.
///
/// Every view carries equal weight, so the result does not depend on view order.
pub struct ViewAggregator;

impl ViewAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Element-wise mean of the per-view vectors.
    pub fn mean(&self, per_view: &[ClassProbabilities]) -> Result<ClassProbabilities, AnalysisError> {
        if per_view.is_empty() {
            return Err(AnalysisError::EmptyViews);
        }

        let mut sums = [0.0f64; NUM_CLASSES];
        for probs in per_view {
            for (sum, &p) in sums.iter_mut().zip(probs.values()) {
                *sum += p;
            }
        }

        let n = per_view.len() as f64;
        for sum in sums.iter_mut() {
            *sum /= n;
        }

        Ok(ClassProbabilities::new(sums))
    }

    /// Aggregate per-view vectors into an analysis result.
    pub fn aggregate(&self, per_view: &[ClassProbabilities]) -> Result<AnalysisResult, AnalysisError> {
        self.mean(per_view).map(AnalysisResult::from_probabilities)
    }

    /// Fraction of views whose own top class matches the aggregated decision
    pub fn agreement(per_view: &[ClassProbabilities], result: &AnalysisResult) -> f64 {
        if per_view.is_empty() {
            return 0.0;
        }

        let agreeing = per_view
            .iter()
            .filter(|p| p.argmax() == result.predicted_class)
            .count();

        agreeing as f64 / per_view.len() as f64
    }
}

impl Default for ViewAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DefectClass;

    fn sample_views() -> Vec<ClassProbabilities> {
        vec![
            ClassProbabilities::new([0.7, 0.1, 0.05, 0.05, 0.05, 0.05]),
            ClassProbabilities::new([0.2, 0.5, 0.1, 0.1, 0.05, 0.05]),
            ClassProbabilities::new([0.1, 0.1, 0.1, 0.1, 0.1, 0.5]),
        ]
    }

    fn assert_close(a: &ClassProbabilities, b: &ClassProbabilities) {
        for (x, y) in a.values().iter().zip(b.values()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_mean_of_views() {
        let aggregator = ViewAggregator::new();
        let result = aggregator.aggregate(&sample_views()).unwrap();

        // crazing: (0.7 + 0.2 + 0.1) / 3
        assert!((result.class_probs.get(DefectClass::Crazing) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.predicted_class, DefectClass::Crazing);
        assert!((result.anomaly_score - 100.0 / 3.0).abs() < 1e-6);
        assert!((result.class_probs.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_views_are_idempotent() {
        let aggregator = ViewAggregator::new();
        let view = ClassProbabilities::new([0.05, 0.15, 0.4, 0.2, 0.1, 0.1]);

        for n in 1..=5 {
            let combined = aggregator.mean(&vec![view; n]).unwrap();
            assert_close(&combined, &view);
        }
    }

    #[test]
    fn test_order_independent() {
        let aggregator = ViewAggregator::new();
        let views = sample_views();
        let expected = aggregator.aggregate(&views).unwrap();

        let permutations = [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for perm in permutations {
            let permuted: Vec<_> = perm.iter().map(|&i| views[i]).collect();
            let result = aggregator.aggregate(&permuted).unwrap();

            assert_eq!(result.predicted_class, expected.predicted_class);
            assert_close(&result.class_probs, &expected.class_probs);
            assert!((result.anomaly_score - expected.anomaly_score).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_views_rejected() {
        let aggregator = ViewAggregator::new();
        assert!(matches!(aggregator.aggregate(&[]), Err(AnalysisError::EmptyViews)));
    }

    #[test]
    fn test_agreement() {
        let aggregator = ViewAggregator::new();
        let views = sample_views();
        let result = aggregator.aggregate(&views).unwrap();

        let agreement = ViewAggregator::agreement(&views, &result);
        assert!((agreement - 1.0 / 3.0).abs() < 1e-9);
    }
}
