//! API route handlers

use crate::decode::decode_views;
use crate::error::{AnalysisError, ApiError, ApiResult};
use crate::metrics::{AnalysisMetrics, MetricsSnapshot};
use crate::models::InferenceEngine;
use crate::report::{InspectionReport, ReportWriter};
use crate::store::PieceStore;
use crate::types::{AnalysisResult, DefectClass, Piece, PieceStatus};
use axum::{
    extract::{multipart::MultipartRejection, FromRequest, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub store: Arc<dyn PieceStore>,
    pub metrics: Arc<AnalysisMetrics>,
    pub reports: ReportWriter,
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(
        engine: Arc<InferenceEngine>,
        store: Arc<dyn PieceStore>,
        uploads_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            store,
            metrics: Arc::new(AnalysisMetrics::new()),
            reports: ReportWriter::new(reports_dir),
            uploads_dir: uploads_dir.into(),
        }
    }

    fn piece(&self, piece_id: &str) -> ApiResult<Piece> {
        self.store
            .get(piece_id)
            .ok_or_else(|| ApiError::NotFound(piece_id.to_string()))
    }
}

/// JSON body extractor whose failures use the API error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub piece_id: String,
    pub filename: String,
    pub message: String,
}

/// Request body for the analyze endpoint
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub piece_id: String,
    /// Base64 encoded PNG/JPEG views
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub piece_id: String,
    pub results: AnalysisResult,
}

/// Request body for report generation
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub piece_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub piece_id: String,
    pub report_path: String,
    pub message: String,
}

/// Request body for validation/rejection
#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    pub piece_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub piece_id: String,
    pub status: PieceStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PieceListResponse {
    pub pieces: Vec<Piece>,
}

#[derive(Debug, Serialize)]
pub struct ClassesResponse {
    pub classes: Vec<&'static str>,
    pub count: usize,
}

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/report", post(report_handler))
        .route("/api/validate", post(validate_handler))
        .route("/api/reject", post(reject_handler))
        .route("/api/pieces", get(list_pieces_handler))
        .route("/api/pieces/{piece_id}", get(get_piece_handler))
        .route("/api/classes", get(classes_handler))
        .route("/api/metrics", get(metrics_handler))
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        service: "NEU Quality Control API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Upload a 3D model file (.stl, .obj, .gltf, .glb)
async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidRequest("Uploaded file has no filename".into()))?;

        let ext = Piece::accepted_extension(&filename).ok_or_else(|| {
            ApiError::InvalidRequest(format!(
                "Invalid file type. Allowed: {}",
                crate::types::piece::ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

        let contents = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let piece_id = Piece::generate_id(Utc::now());
        let file_path = state.uploads_dir.join(format!("{}{}", piece_id, ext));

        tokio::fs::create_dir_all(&state.uploads_dir)
            .await
            .map_err(|e| ApiError::Internal(format!("Upload failed: {}", e)))?;
        tokio::fs::write(&file_path, &contents)
            .await
            .map_err(|e| ApiError::Internal(format!("Upload failed: {}", e)))?;

        state.store.put(Piece::new(
            piece_id.clone(),
            filename.clone(),
            file_path.display().to_string(),
        ));

        info!(piece_id = %piece_id, filename = %filename, bytes = contents.len(), "Piece uploaded");

        return Ok(Json(UploadResponse {
            piece_id,
            filename,
            message: "File uploaded successfully".to_string(),
        }));
    }

    Err(ApiError::InvalidRequest("Missing multipart field `file`".into()))
}

/// Decode the submitted views and run the defect classifier
async fn analyze_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let piece_id = request.piece_id;
    state.piece(&piece_id)?;

    let start_time = Instant::now();
    let view_count = request.images.len();
    let engine = state.engine.clone();
    let id = piece_id.clone();

    let outcome = tokio::task::spawn_blocking(move || -> Result<AnalysisResult, AnalysisError> {
        let views = decode_views(&request.images)?;
        engine.analyze(&id, &views)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Analysis task failed: {}", e)))?;

    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            state.metrics.record_failure();
            if e.is_client_error() {
                warn!(piece_id = %piece_id, error = %e, "Analysis rejected");
            } else {
                error!(piece_id = %piece_id, error = %e, "Analysis failed");
            }
            return Err(e.into());
        }
    };

    let latency = start_time.elapsed();
    state
        .metrics
        .record_analysis(latency, view_count, state.engine.mode(), &results);

    state
        .store
        .update(&piece_id, &mut |p| p.record_analysis(results.clone()))
        .ok_or_else(|| ApiError::NotFound(piece_id.clone()))?;

    info!(
        piece_id = %piece_id,
        views = view_count,
        predicted_class = %results.predicted_class,
        anomaly_score = results.anomaly_score,
        mode = ?state.engine.mode(),
        latency_us = latency.as_micros() as u64,
        "Piece analyzed"
    );

    Ok(Json(AnalyzeResponse { piece_id, results }))
}

/// Write the inspection report of an analyzed piece
async fn report_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let piece = state.piece(&request.piece_id)?;

    let report = InspectionReport::for_piece(&piece, request.notes.unwrap_or_default())
        .ok_or_else(|| ApiError::InvalidRequest("Piece has not been analyzed yet".into()))?;

    let path = state.reports.write(&report).await?;
    let report_path = path.display().to_string();

    state
        .store
        .update(&piece.id, &mut |p| p.report_path = Some(report_path.clone()))
        .ok_or_else(|| ApiError::NotFound(piece.id.clone()))?;

    Ok(Json(ReportResponse {
        piece_id: piece.id,
        report_path,
        message: "Report generated successfully".to_string(),
    }))
}

async fn validate_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ValidationRequest>,
) -> ApiResult<Json<ValidationResponse>> {
    let mut notes = request.notes;
    let piece = state
        .store
        .update(&request.piece_id, &mut |p| p.validate(notes.take()))
        .ok_or_else(|| ApiError::NotFound(request.piece_id.clone()))?;

    info!(piece_id = %piece.id, "Piece validated");

    Ok(Json(ValidationResponse {
        piece_id: piece.id,
        status: piece.status,
        message: "Piece validated successfully".to_string(),
    }))
}

async fn reject_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ValidationRequest>,
) -> ApiResult<Json<ValidationResponse>> {
    let mut notes = request.notes;
    let piece = state
        .store
        .update(&request.piece_id, &mut |p| p.reject(notes.take()))
        .ok_or_else(|| ApiError::NotFound(request.piece_id.clone()))?;

    info!(piece_id = %piece.id, "Piece rejected");

    Ok(Json(ValidationResponse {
        piece_id: piece.id,
        status: piece.status,
        message: "Piece rejected".to_string(),
    }))
}

async fn get_piece_handler(
    State(state): State<AppState>,
    Path(piece_id): Path<String>,
) -> ApiResult<Json<Piece>> {
    state.piece(&piece_id).map(Json)
}

async fn list_pieces_handler(State(state): State<AppState>) -> Json<PieceListResponse> {
    Json(PieceListResponse {
        pieces: state.store.list(),
    })
}

async fn classes_handler() -> Json<ClassesResponse> {
    let classes = DefectClass::labels();
    Json(ClassesResponse {
        count: classes.len(),
        classes,
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
