//! Defect classifier inference components

pub mod aggregator;
pub mod classifier;
pub mod inference;
pub mod loader;
pub mod mock;

pub use aggregator::ViewAggregator;
pub use classifier::{Classifier, OnnxClassifier};
pub use inference::{InferenceBackend, InferenceEngine, InferenceMode};
pub use loader::ModelLoader;
pub use mock::MockGenerator;
