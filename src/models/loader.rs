//! Builds ONNX Runtime sessions for the defect CNN

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Output name fragments that identify the class-probability head
const PROBABILITY_OUTPUT_HINTS: [&str; 3] = ["prob", "output", "dense"];

/// A committed session plus the tensor names the classifier binds to.
pub struct LoadedModel {
    /// File stem of the artifact, used in logs
    pub name: String,
    pub session: Session,
    /// Image batch input `[N, 200, 200, 1]`
    pub input_name: String,
    /// Six-way class output `[N, 6]`
    pub output_name: String,
}

/// Opens the exported CNN with a fixed intra-op thread budget.
pub struct ModelLoader {
    onnx_threads: usize,
}

impl ModelLoader {
    /// A thread count of zero is raised to one.
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Open `path` and resolve its input and probability output names.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Opening defect classifier");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("Model declares no inputs")?;
        let output_name = probability_output(&session).context("Model declares no outputs")?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Defect classifier ready"
        );

        Ok(LoadedModel {
            name,
            session,
            input_name,
            output_name,
        })
    }
}

/// First output whose name looks like a probability head, else the first output.
fn probability_output(session: &Session) -> Option<String> {
    session
        .outputs
        .iter()
        .find(|o| PROBABILITY_OUTPUT_HINTS.iter().any(|&hint| o.name.contains(hint)))
        .or_else(|| session.outputs.first())
        .map(|o| o.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_an_error() {
        let loader = ModelLoader::with_threads(0);
        assert_eq!(loader.onnx_threads, 1);
        assert!(loader.load_model("does/not/exist.onnx").is_err());
    }

    #[test]
    fn test_corrupt_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.onnx");
        std::fs::write(&path, b"definitely not a protobuf").unwrap();

        assert!(ModelLoader::with_threads(1).load_model(&path).is_err());
    }
}
