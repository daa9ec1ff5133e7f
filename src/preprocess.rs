//! View preprocessing for CNN inference.
//!
//! Turns an arbitrary-size grayscale or RGB raster into the exact input the
//! defect classifier was trained on: a 200x200x1 `f32` tensor scaled to [0, 1].

use crate::error::AnalysisError;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::{Array2, Array3, ArrayD, Axis, Ix2, Ix3};

/// Side length of the square model input
pub const IMG_SIZE: usize = 200;

/// Decoded 8-bit raster: `[H, W]`, `[H, W, 1]` or `[H, W, 3]`.
pub type RawView = ArrayD<u8>;

/// Model-ready view tensor of shape `[200, 200, 1]` with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedView(Array3<f32>);

impl NormalizedView {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn as_array(&self) -> &Array3<f32> {
        &self.0
    }

    /// Pixel values in row-major (NHWC) order
    pub fn pixels(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.iter().copied()
    }
}

/// Preprocessor producing the classifier input contract.
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Preprocess one raster.
    ///
    /// Channel reduction, bilinear resize to 200x200 (aspect ratio is not
    /// preserved), `/ 255.0` scaling, then a trailing channel axis.
    pub fn preprocess(&self, image: &RawView) -> Result<NormalizedView, AnalysisError> {
        let gray = to_grayscale(image)?;
        let (height, width) = gray.dim();
        if height == 0 || width == 0 {
            return Err(AnalysisError::InvalidShape(format!(
                "empty raster {:?}",
                image.shape()
            )));
        }

        let raster = GrayImage::from_raw(width as u32, height as u32, gray.iter().copied().collect())
            .ok_or_else(|| {
                AnalysisError::InvalidShape(format!("raster {:?} does not fit its buffer", image.shape()))
            })?;

        let resized = if height == IMG_SIZE && width == IMG_SIZE {
            raster
        } else {
            imageops::resize(&raster, IMG_SIZE as u32, IMG_SIZE as u32, FilterType::Triangle)
        };

        let tensor = Array3::from_shape_fn((IMG_SIZE, IMG_SIZE, 1), |(y, x, _)| {
            resized.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
        });

        Ok(NormalizedView(tensor))
    }

    /// Preprocess every view; the first failure aborts the batch.
    pub fn preprocess_all(&self, images: &[RawView]) -> Result<Vec<NormalizedView>, AnalysisError> {
        images.iter().map(|img| self.preprocess(img)).collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// BT.601 luma, same weights as the usual RGB->GRAY conversion
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

fn to_grayscale(image: &RawView) -> Result<Array2<u8>, AnalysisError> {
    let invalid = || {
        AnalysisError::InvalidShape(format!(
            "expected [H, W], [H, W, 1] or [H, W, 3], got {:?}",
            image.shape()
        ))
    };

    match image.ndim() {
        2 => image
            .view()
            .into_dimensionality::<Ix2>()
            .map(|v| v.to_owned())
            .map_err(|_| invalid()),
        3 => {
            let view = image.view().into_dimensionality::<Ix3>().map_err(|_| invalid())?;
            match view.shape()[2] {
                1 => Ok(view.index_axis(Axis(2), 0).to_owned()),
                3 => {
                    let (h, w, _) = view.dim();
                    Ok(Array2::from_shape_fn((h, w), |(y, x)| {
                        luma(view[[y, x, 0]], view[[y, x, 1]], view[[y, x, 2]])
                    }))
                }
                _ => Err(invalid()),
            }
        }
        _ => Err(invalid()),
    }
}
