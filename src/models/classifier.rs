//! Classifier adapter over the trained CNN

use crate::error::AnalysisError;
use crate::models::loader::LoadedModel;
use crate::preprocess::{NormalizedView, IMG_SIZE};
use crate::types::{ClassProbabilities, NUM_CLASSES};
use ndarray::{Array4, ArrayView3, Axis};
use ort::value::TensorRef;
use std::sync::Mutex;
use tracing::debug;

/// Produces one probability vector per preprocessed view.
///
/// Implementations must be safe to share between in-flight requests.
pub trait Classifier: Send + Sync {
    /// Classify every view; output order matches input order.
    fn classify(&self, views: &[NormalizedView]) -> Result<Vec<ClassProbabilities>, AnalysisError>;

    /// Name reported in logs and metrics
    fn name(&self) -> &str;
}

/// Classifier backed by an ONNX Runtime session.
///
/// Expects `[N, 200, 200, 1]` float input and `[N, 6]` output.
pub struct OnnxClassifier {
    name: String,
    input_name: String,
    output_name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<ort::session::Session>,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            name: model.name,
            input_name: model.input_name,
            output_name: model.output_name,
            session: Mutex::new(model.session),
        }
    }

    fn batch(views: &[NormalizedView]) -> Result<Array4<f32>, AnalysisError> {
        let arrays: Vec<ArrayView3<f32>> = views.iter().map(|v| v.as_array().view()).collect();
        ndarray::stack(Axis(0), &arrays)
            .map_err(|e| AnalysisError::Inference(format!("Failed to build input batch: {}", e)))
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, views: &[NormalizedView]) -> Result<Vec<ClassProbabilities>, AnalysisError> {
        if views.is_empty() {
            return Err(AnalysisError::EmptyViews);
        }

        let batch = Self::batch(views)?;
        debug_assert_eq!(batch.shape(), &[views.len(), IMG_SIZE, IMG_SIZE, 1]);

        let input = TensorRef::from_array_view(batch.view())
            .map_err(|e| AnalysisError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| AnalysisError::Inference(format!("Lock error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| AnalysisError::Inference(format!("Model run failed: {}", e)))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                AnalysisError::Inference(format!("Failed to extract output '{}': {}", self.output_name, e))
            })?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        if dims != [views.len() as i64, NUM_CLASSES as i64] {
            return Err(AnalysisError::Inference(format!(
                "Unexpected output shape {:?}, expected [{}, {}]",
                dims,
                views.len(),
                NUM_CLASSES
            )));
        }

        let per_view = data
            .chunks_exact(NUM_CLASSES)
            .map(|row| {
                ClassProbabilities::from_model_output(row).ok_or_else(|| {
                    AnalysisError::Inference(format!("Non-finite model output {:?}", row))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(model = %self.name, views = views.len(), "Model inference complete");

        Ok(per_view)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
