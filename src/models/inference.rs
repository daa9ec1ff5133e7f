//! Inference engine: preprocessing, classification and view aggregation

use crate::config::ModelsConfig;
use crate::error::AnalysisError;
use crate::models::aggregator::ViewAggregator;
use crate::models::classifier::{Classifier, OnnxClassifier};
use crate::models::loader::ModelLoader;
use crate::models::mock::MockGenerator;
use crate::preprocess::{Preprocessor, RawView};
use crate::types::AnalysisResult;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which inference path the engine uses.
#[derive(Clone)]
pub enum InferenceBackend {
    /// Trained model
    Real(Arc<dyn Classifier>),
    /// Deterministic stand-in keyed by piece identifier
    Mock,
}

impl InferenceBackend {
    /// Load the model at `path`, or fall back to mock inference.
    ///
    /// A missing or unloadable artifact is an expected operating mode, so
    /// this never fails.
    pub fn load<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Model not found, using mock inference");
            return InferenceBackend::Mock;
        }

        match ModelLoader::with_threads(onnx_threads).load_model(path) {
            Ok(model) => InferenceBackend::Real(Arc::new(OnnxClassifier::new(model))),
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "Failed to load model, using mock inference");
                InferenceBackend::Mock
            }
        }
    }

    pub fn mode(&self) -> InferenceMode {
        match self {
            InferenceBackend::Real(_) => InferenceMode::Model,
            InferenceBackend::Mock => InferenceMode::Mock,
        }
    }
}

/// Inference path taken for an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    Model,
    Mock,
}

/// Top-level analysis entry point shared by all request handlers.
pub struct InferenceEngine {
    backend: InferenceBackend,
    preprocessor: Preprocessor,
    aggregator: ViewAggregator,
    mock: MockGenerator,
}

impl InferenceEngine {
    /// Build the engine from configuration, loading the model once.
    pub fn new(config: &ModelsConfig) -> Self {
        let backend = InferenceBackend::load(&config.model_path, config.onnx_threads);

        info!(
            mode = ?backend.mode(),
            model_path = %config.model_path,
            "Inference engine initialized"
        );

        Self::with_backend(backend)
    }

    pub fn with_backend(backend: InferenceBackend) -> Self {
        Self {
            backend,
            preprocessor: Preprocessor::new(),
            aggregator: ViewAggregator::new(),
            mock: MockGenerator::new(),
        }
    }

    /// Engine that always uses mock inference
    pub fn mock() -> Self {
        Self::with_backend(InferenceBackend::Mock)
    }

    pub fn mode(&self) -> InferenceMode {
        self.backend.mode()
    }

    /// Analyze every view of a piece.
    ///
    /// All views are preprocessed first, so a malformed view fails the call
    /// on both paths. With a trained model the per-view probabilities are
    /// averaged; in mock mode the result depends only on `piece_id`.
    pub fn analyze(&self, piece_id: &str, views: &[RawView]) -> Result<AnalysisResult, AnalysisError> {
        if views.is_empty() {
            return Err(AnalysisError::EmptyViews);
        }

        let normalized = self.preprocessor.preprocess_all(views)?;

        let result = match &self.backend {
            InferenceBackend::Real(classifier) => {
                let per_view = classifier.classify(&normalized)?;
                if per_view.len() != normalized.len() {
                    return Err(AnalysisError::Inference(format!(
                        "Classifier returned {} vectors for {} views",
                        per_view.len(),
                        normalized.len()
                    )));
                }

                let result = self.aggregator.aggregate(&per_view)?;
                debug!(
                    piece_id = %piece_id,
                    model = %classifier.name(),
                    views = per_view.len(),
                    agreement = ViewAggregator::agreement(&per_view, &result),
                    "Model inference complete"
                );
                result
            }
            InferenceBackend::Mock => {
                let result = self.mock.generate(piece_id);
                debug!(piece_id = %piece_id, views = views.len(), "Mock inference complete");
                result
            }
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::NormalizedView;
    use crate::types::{ClassProbabilities, DefectClass};
    use ndarray::{ArrayD, IxDyn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores each view by its mean brightness: bright views look like scratches.
    struct BrightnessClassifier {
        calls: AtomicUsize,
    }

    impl Classifier for BrightnessClassifier {
        fn classify(&self, views: &[NormalizedView]) -> Result<Vec<ClassProbabilities>, AnalysisError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(views
                .iter()
                .map(|v| {
                    let mean = v.pixels().sum::<f32>() as f64 / v.as_array().len() as f64;
                    let rest = (1.0 - mean) / 5.0;
                    ClassProbabilities::new([rest, rest, rest, rest, rest, mean])
                })
                .collect())
        }

        fn name(&self) -> &str {
            "brightness"
        }
    }

    fn constant_view(value: u8) -> RawView {
        ArrayD::from_elem(IxDyn(&[200, 200]), value)
    }

    #[test]
    fn test_mock_single_white_view() {
        let engine = InferenceEngine::mock();
        let result = engine.analyze("TEST_PIECE_123", &[constant_view(255)]).unwrap();

        let json = serde_json::to_value(&result).unwrap();
        let probs = json["class_probs"].as_object().unwrap();
        for label in DefectClass::labels() {
            assert!(probs.contains_key(label));
        }
        assert_eq!(engine.mode(), InferenceMode::Mock);
    }

    #[test]
    fn test_mock_ignores_views() {
        let engine = InferenceEngine::mock();
        let one = engine.analyze("TEST_PIECE_123", &[constant_view(0)]).unwrap();
        let many = engine
            .analyze("TEST_PIECE_123", &[constant_view(10), constant_view(200), constant_view(90)])
            .unwrap();

        assert_eq!(one, many);
        assert_eq!(one, MockGenerator::new().generate("TEST_PIECE_123"));
    }

    #[test]
    fn test_real_backend_averages_views() {
        let classifier = Arc::new(BrightnessClassifier {
            calls: AtomicUsize::new(0),
        });
        let engine = InferenceEngine::with_backend(InferenceBackend::Real(classifier.clone()));

        let result = engine
            .analyze("P1", &[constant_view(255), constant_view(255), constant_view(0)])
            .unwrap();

        assert_eq!(engine.mode(), InferenceMode::Model);
        assert_eq!(classifier.calls.load(Ordering::Relaxed), 1);
        assert_eq!(result.predicted_class, DefectClass::Scratches);
        assert!((result.anomaly_score - 200.0 / 3.0).abs() < 0.01);
        assert!((result.class_probs.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_views_rejected_on_both_paths() {
        let mock = InferenceEngine::mock();
        assert!(matches!(mock.analyze("P1", &[]), Err(AnalysisError::EmptyViews)));

        let real = InferenceEngine::with_backend(InferenceBackend::Real(Arc::new(
            BrightnessClassifier {
                calls: AtomicUsize::new(0),
            },
        )));
        assert!(matches!(real.analyze("P1", &[]), Err(AnalysisError::EmptyViews)));
    }

    #[test]
    fn test_bad_view_aborts_whole_call() {
        let engine = InferenceEngine::mock();
        let bad = ArrayD::from_elem(IxDyn(&[10, 10, 4]), 0u8);

        assert!(matches!(
            engine.analyze("P1", &[constant_view(3), bad]),
            Err(AnalysisError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_missing_model_falls_back_to_mock() {
        let backend = InferenceBackend::load("no/such/model.onnx", 1);
        assert_eq!(backend.mode(), InferenceMode::Mock);
    }

    #[test]
    fn test_corrupt_model_falls_back_to_mock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neu_cnn_model.onnx");
        std::fs::write(&path, b"garbage").unwrap();

        let backend = InferenceBackend::load(&path, 1);
        assert_eq!(backend.mode(), InferenceMode::Mock);
    }
}
