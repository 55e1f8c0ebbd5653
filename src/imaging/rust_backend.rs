//! Pure Rust decoding backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::with_guessed_format` + `into_dimensions` |
//! | Decode (JPEG, PNG, TIFF, WebP) | `ImageReader::decode` |
//! | Resize | `DynamicImage::resize_exact` with the configured filter |

use super::backend::{BackendError, Dimensions, ImageBackend, SourceInfo};
use super::params::ResizeParams;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has a decodable image extension (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Backend using the `image` crate's pure Rust codecs.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(BackendError::Io)
}

fn format_name(format: Option<ImageFormat>) -> String {
    format
        .and_then(|f| f.extensions_str().first().copied())
        .map(|ext| match ext {
            "jpg" => "jpeg",
            "tif" => "tiff",
            other => other,
        })
        .unwrap_or("unknown")
        .to_string()
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<SourceInfo, BackendError> {
        let reader = reader(bytes)?;
        let format = format_name(reader.format());
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {}", e)))?;
        Ok(SourceInfo {
            format,
            byte_len: bytes.len(),
            dimensions: Dimensions { width, height },
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        reader(bytes)?
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn resize(&self, img: &DynamicImage, params: &ResizeParams) -> DynamicImage {
        if (img.width(), img.height()) == (params.width, params.height) {
            return img.clone();
        }
        img.resize_exact(params.width, params.height, params.filter.filter_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Resampling;
    use crate::test_helpers::{encode_jpeg, encode_png, gradient_rgb};
    use image::{Rgba, RgbaImage};

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn supported_image_is_case_insensitive() {
        assert!(is_supported_image(Path::new("original.PNG")));
        assert!(is_supported_image(Path::new("001-studio.jpeg")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("mask")));
    }

    #[test]
    fn identify_png_buffer() {
        let bytes = encode_png(&DynamicImage::ImageRgb8(gradient_rgb(200, 150)));

        let info = RustBackend::new().identify(&bytes).unwrap();
        assert_eq!(info.format, "png");
        assert_eq!(info.byte_len, bytes.len());
        assert_eq!(info.dimensions, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_jpeg_buffer() {
        let bytes = encode_jpeg(&gradient_rgb(64, 32));
        let info = RustBackend::new().identify(&bytes).unwrap();
        assert_eq!(info.format, "jpeg");
        assert_eq!(info.dimensions.as_tuple(), (64, 32));
    }

    #[test]
    fn identify_garbage_errors() {
        let result = RustBackend::new().identify(b"definitely not an image");
        assert!(result.is_err());
    }

    #[test]
    fn decode_png_preserves_alpha_source() {
        let rgba = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let bytes = encode_png(&DynamicImage::ImageRgba8(rgba));

        let img = RustBackend::new().decode(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert_eq!(img.to_rgba8().get_pixel(0, 0).0, [1, 2, 3, 4]);
    }

    #[test]
    fn decode_truncated_buffer_errors() {
        let bytes = encode_png(&DynamicImage::ImageRgb8(gradient_rgb(32, 32)));
        let result = RustBackend::new().decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn resize_to_exact_dimensions() {
        let img = DynamicImage::ImageRgb8(gradient_rgb(100, 50));
        let out = RustBackend::new().resize(
            &img,
            &ResizeParams {
                width: 40,
                height: 21,
                filter: Resampling::Lanczos3,
            },
        );
        assert_eq!((out.width(), out.height()), (40, 21));
    }

    #[test]
    fn resize_noop_when_already_sized() {
        let img = DynamicImage::ImageRgb8(gradient_rgb(16, 16));
        let out = RustBackend::new().resize(
            &img,
            &ResizeParams {
                width: 16,
                height: 16,
                filter: Resampling::Nearest,
            },
        );
        assert_eq!(out, img);
    }
}
