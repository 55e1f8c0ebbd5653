//! Parameter types for image normalization.
//!
//! These describe *what* the adapter should do to a decoded raster before the
//! fidelity check: which resampling filter to use, which channel of the mask
//! source carries the region, and the target dimensions. The backend
//! ([`ImageBackend`](super::backend::ImageBackend)) does the pixel work.
//!
//! ## Types
//!
//! - [`Resampling`]: Filter used when resizing images or masks to the working size.
//! - [`MaskChannel`]: Which intensity of the mask source decides "in-region".
//! - [`ResizeParams`]: Exact target dimensions plus filter for one resize.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resampling filter for resizing rasters to the working resolution.
///
/// Configured separately for photos and for masks. Photos default to
/// `lanczos3`; masks default to `nearest` so that edge pixels keep their
/// binary value instead of blending toward the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    Nearest,
    Bilinear,
    Lanczos3,
}

impl Resampling {
    pub fn filter_type(self) -> FilterType {
        match self {
            Resampling::Nearest => FilterType::Nearest,
            Resampling::Bilinear => FilterType::Triangle,
            Resampling::Lanczos3 => FilterType::Lanczos3,
        }
    }

    /// Stable name, used in cache keys and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Resampling::Nearest => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Lanczos3 => "lanczos3",
        }
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel of the mask source image that carries region intensity.
///
/// - `luma`: grayscale brightness (white = in-region). Works for black/white
///   PNG masks and for RGB masks, which are converted to luma first.
/// - `alpha`: the alpha channel (opaque = in-region). Sources without alpha
///   are treated as fully opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskChannel {
    Luma,
    Alpha,
}

impl MaskChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            MaskChannel::Luma => "luma",
            MaskChannel::Alpha => "alpha",
        }
    }
}

/// Parameters for a single exact resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub filter: Resampling,
}
