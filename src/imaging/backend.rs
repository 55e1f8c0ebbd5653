//! Image decoding backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the verification
//! adapter needs: identify, decode, and resize.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) on the `image` crate.
//! Tests use a mock that records calls and returns canned rasters.

use super::params::ResizeParams;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Width and height of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// What an identify call learns about an encoded buffer without decoding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Detected container format, lowercase (`"png"`, `"jpeg"`, ...).
    pub format: String,
    /// Size of the encoded buffer.
    pub byte_len: usize,
    /// Native dimensions.
    pub dimensions: Dimensions,
}

/// Trait for image decoding backends.
///
/// Implementations must be `Sync`: the batch stage shares one backend across
/// rayon workers.
pub trait ImageBackend: Sync {
    /// Detect format and native dimensions of an encoded buffer.
    fn identify(&self, bytes: &[u8]) -> Result<SourceInfo, BackendError>;

    /// Decode an encoded buffer.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Resize to exact dimensions with the requested filter.
    fn resize(&self, img: &DynamicImage, params: &ResizeParams) -> DynamicImage;
}
