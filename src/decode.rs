//! Decoding of base64 view payloads into grayscale rasters

use crate::error::AnalysisError;
use crate::preprocess::RawView;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ndarray::{ArrayD, IxDyn};

/// Decode one base64 PNG/JPEG payload (optionally a data URL) into a grayscale raster.
pub fn decode_view(index: usize, payload: &str) -> Result<RawView, AnalysisError> {
    let fail = |reason: String| AnalysisError::Decode { index, reason };

    // Strip `data:image/png;base64,` style prefixes
    let encoded = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| fail(format!("invalid base64: {}", e)))?;

    let gray = image::load_from_memory(&bytes)
        .map_err(|e| fail(format!("unsupported image data: {}", e)))?
        .into_luma8();

    let (width, height) = gray.dimensions();
    ArrayD::from_shape_vec(IxDyn(&[height as usize, width as usize]), gray.into_raw())
        .map_err(|e| fail(e.to_string()))
}

/// Decode every payload; the first failure aborts the batch.
pub fn decode_views(payloads: &[String]) -> Result<Vec<RawView>, AnalysisError> {
    payloads
        .iter()
        .enumerate()
        .map(|(i, p)| decode_view(i, p))
        .collect()
}
