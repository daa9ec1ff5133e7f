//! Inspection report generation

use crate::types::{AnalysisResult, Piece, PieceStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Inspection report written for an analyzed piece
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    pub piece_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub results: AnalysisResult,
    pub notes: String,
    pub status: PieceStatus,
}

impl InspectionReport {
    /// Build a report; `None` if the piece has not been analyzed.
    pub fn for_piece(piece: &Piece, notes: String) -> Option<Self> {
        let results = piece.analysis_results.clone()?;
        Some(Self {
            piece_id: piece.id.clone(),
            filename: piece.filename.clone(),
            uploaded_at: piece.uploaded_at,
            analyzed_at: piece.analyzed_at,
            results,
            notes,
            status: piece.status,
        })
    }
}

/// Writes reports as pretty-printed JSON documents
#[derive(Debug, Clone)]
pub struct ReportWriter {
    reports_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn report_path(&self, piece_id: &str) -> PathBuf {
        self.reports_dir.join(format!("{}_report.json", piece_id))
    }

    /// Write the report, replacing any previous one for the piece
    pub async fn write(&self, report: &InspectionReport) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.reports_dir.display()))?;

        let path = self.report_path(&report.piece_id);
        let body = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write report {}", path.display()))?;

        info!(piece_id = %report.piece_id, path = %path.display(), "Report generated");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MockGenerator;

    #[test]
    fn test_requires_analysis() {
        let piece = Piece::new("P1".into(), "p.stl".into(), "x".into());
        assert!(InspectionReport::for_piece(&piece, String::new()).is_none());
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("reports"));

        let mut piece = Piece::new("P1".into(), "p.stl".into(), "x".into());
        piece.record_analysis(MockGenerator::new().generate("P1"));

        let report = InspectionReport::for_piece(&piece, "Test notes".into()).unwrap();
        let path = writer.write(&report).await.unwrap();

        assert_eq!(path, dir.path().join("reports").join("P1_report.json"));
        let saved: InspectionReport =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved.piece_id, "P1");
        assert_eq!(saved.notes, "Test notes");
        assert_eq!(saved.status, PieceStatus::Analyzed);
        assert_eq!(saved.results.predicted_class, report.results.predicted_class);
        assert!((saved.results.anomaly_score - report.results.anomaly_score).abs() < 1e-9);
    }
}
