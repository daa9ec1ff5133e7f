//! NEU Quality Control Library
//!
//! Surface defect inspection for uploaded 3D pieces: multi-view renders are
//! preprocessed, scored by a CNN (or a deterministic mock when no model is
//! available) and averaged into a single decision.

pub mod api;
pub mod config;
pub mod decode;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod report;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use error::{AnalysisError, ApiError};
pub use models::inference::{InferenceBackend, InferenceEngine};
pub use preprocess::{NormalizedView, Preprocessor, RawView};
pub use store::{InMemoryPieceStore, PieceStore};
pub use types::{AnalysisResult, ClassProbabilities, DefectClass, Piece, PieceStatus};
