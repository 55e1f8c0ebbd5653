//! Image decoding and normalization: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Decode** | `image` crate codecs (JPEG, PNG, TIFF, WebP) |
//! | **Resize** | `resize_exact` with Lanczos3 / bilinear / nearest |
//! | **Mask threshold** | luma or alpha, strictly greater than 128 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for working-resolution geometry (unit testable)
//! - **Parameters**: Filter and channel choices for normalization
//! - **Raster**: The decoded [`Image`] and binary [`Mask`] types
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod raster;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, SourceInfo};
pub use calculations::{HEIGHT_TOLERANCE, calculate_working_dimensions, shapes_agree};
pub use params::{MaskChannel, Resampling, ResizeParams};
pub use raster::{Image, MASK_THRESHOLD, Mask};
pub use rust_backend::{RustBackend, is_supported_image, supported_input_extensions};
