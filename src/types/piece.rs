//! Inspected piece and its workflow status

use crate::types::analysis::AnalysisResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Allowed 3D model file extensions for upload
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".stl", ".obj", ".gltf", ".glb"];

/// Workflow status of a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceStatus {
    Uploaded,
    Analyzed,
    Validated,
    Rejected,
}

/// One uploaded 3D piece submitted for inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Piece {
    /// Piece identifier
    pub id: String,

    /// Original filename of the uploaded model
    pub filename: String,

    /// Where the uploaded model was stored
    pub file_path: String,

    pub uploaded_at: DateTime<Utc>,

    pub status: PieceStatus,

    /// Latest analysis, replaced on re-analysis
    pub analysis_results: Option<AnalysisResult>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub analyzed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub validated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub validation_notes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rejected_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rejection_notes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub report_path: Option<String>,
}

impl Piece {
    /// Create a freshly uploaded piece
    pub fn new(id: String, filename: String, file_path: String) -> Self {
        Self {
            id,
            filename,
            file_path,
            uploaded_at: Utc::now(),
            status: PieceStatus::Uploaded,
            analysis_results: None,
            analyzed_at: None,
            validated_at: None,
            validation_notes: None,
            rejected_at: None,
            rejection_notes: None,
            report_path: None,
        }
    }

    /// Generate a piece identifier: `PIECE_<timestamp>_<8 hex chars>`
    pub fn generate_id(now: DateTime<Utc>) -> String {
        let suffix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect();
        format!(
            "PIECE_{}_{}",
            now.format("%Y%m%d_%H%M%S"),
            suffix.to_uppercase()
        )
    }

    /// Lowercased extension of `filename` if it is an accepted 3D format
    pub fn accepted_extension(filename: &str) -> Option<String> {
        let ext = std::path::Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))?;
        ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }

    /// Store a new analysis and move to `analyzed`
    pub fn record_analysis(&mut self, result: AnalysisResult) {
        self.analysis_results = Some(result);
        self.analyzed_at = Some(Utc::now());
        self.status = PieceStatus::Analyzed;
    }

    pub fn validate(&mut self, notes: Option<String>) {
        self.status = PieceStatus::Validated;
        self.validated_at = Some(Utc::now());
        self.validation_notes = notes;
    }

    pub fn reject(&mut self, notes: Option<String>) {
        self.status = PieceStatus::Rejected;
        self.rejected_at = Some(Utc::now());
        self.rejection_notes = notes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::defect::ClassProbabilities;
    use chrono::TimeZone;

    #[test]
    fn test_generate_id_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let id = Piece::generate_id(now);

        assert!(id.starts_with("PIECE_20240305_140709_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_accepted_extension() {
        assert_eq!(Piece::accepted_extension("part.STL"), Some(".stl".to_string()));
        assert_eq!(Piece::accepted_extension("scene.glb"), Some(".glb".to_string()));
        assert_eq!(Piece::accepted_extension("notes.txt"), None);
        assert_eq!(Piece::accepted_extension("noext"), None);
    }

    #[test]
    fn test_lifecycle() {
        let mut piece = Piece::new("P1".into(), "a.stl".into(), "data/uploads/P1.stl".into());
        assert_eq!(piece.status, PieceStatus::Uploaded);

        let probs = ClassProbabilities::new([0.5, 0.1, 0.1, 0.1, 0.1, 0.1]);
        piece.record_analysis(AnalysisResult::from_probabilities(probs));
        assert_eq!(piece.status, PieceStatus::Analyzed);
        assert!(piece.analyzed_at.is_some());

        piece.reject(Some("cracked".into()));
        assert_eq!(piece.status, PieceStatus::Rejected);
        assert_eq!(piece.rejection_notes.as_deref(), Some("cracked"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PieceStatus::Validated).unwrap();
        assert_eq!(json, "\"validated\"");
    }
}
