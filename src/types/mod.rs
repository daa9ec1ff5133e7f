//! Type definitions for the quality control service

pub mod analysis;
pub mod defect;
pub mod piece;

pub use analysis::AnalysisResult;
pub use defect::{ClassProbabilities, DefectClass, NUM_CLASSES};
pub use piece::{Piece, PieceStatus};
