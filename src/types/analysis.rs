//! Analysis result returned by the inference engine

use crate::types::defect::{ClassProbabilities, DefectClass};
use serde::{Deserialize, Serialize};

/// Outcome of one analysis call, identical in shape for model and mock inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Most probable defect class
    pub predicted_class: DefectClass,
    /// Probability for every defect class
    pub class_probs: ClassProbabilities,
    /// Peak class probability scaled to 0-100
    pub anomaly_score: f64,
}

impl AnalysisResult {
    /// Derive the decision from a final probability vector.
    pub fn from_probabilities(class_probs: ClassProbabilities) -> Self {
        let predicted_class = class_probs.argmax();
        let anomaly_score = (class_probs.max() * 100.0).clamp(0.0, 100.0);

        Self {
            predicted_class,
            class_probs,
            anomaly_score,
        }
    }
}
