//! Shared test utilities for the fidelity-gate test suite.
//!
//! Raster builders for synthetic originals/candidates/masks, in-memory
//! encoders, and a job-tree writer for scan and batch tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let original = solid_image(4, 4, [100, 100, 100]);
//! let mask = checkerboard_mask(4, 4);
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! write_job(tmp.path(), "010-sneaker", &JobFixture::identical(32, 24));
//! ```

use crate::imaging::{Image, Mask};
use image::{DynamicImage, GrayImage, ImageEncoder, ImageFormat, Luma, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

// =========================================================================
// Raster builders
// =========================================================================

pub fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> Image {
    Image::from_rgb(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

pub fn full_mask(width: u32, height: u32) -> Mask {
    Mask::from_fn(width, height, |_, _| true)
}

/// In-region where `x + y` is even.
pub fn checkerboard_mask(width: u32, height: u32) -> Mask {
    Mask::from_fn(width, height, |x, y| (x + y) % 2 == 0)
}

/// A smooth RGB gradient with some structure for resize tests.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Grayscale mask source: white rectangle `[x0, x1) × [y0, y1)` on black.
pub fn rect_mask_source(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> GrayImage {
    let (x0, y0, x1, y1) = rect;
    GrayImage::from_fn(width, height, |x, y| {
        if x >= x0 && x < x1 && y >= y0 && y < y1 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

// =========================================================================
// Encoders
// =========================================================================

pub fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 95)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

// =========================================================================
// Job trees
// =========================================================================

/// Encoded inputs for one job directory.
pub struct JobFixture {
    pub original: DynamicImage,
    pub mask: DynamicImage,
    /// `(file name, image)` per candidate, e.g. `("001-studio.png", img)`.
    pub candidates: Vec<(String, DynamicImage)>,
}

impl JobFixture {
    /// Original, full mask, and one candidate identical to the original.
    pub fn identical(width: u32, height: u32) -> Self {
        let original = DynamicImage::ImageRgb8(gradient_rgb(width, height));
        Self {
            mask: DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255]))),
            candidates: vec![("001-same.png".to_string(), original.clone())],
            original,
        }
    }

    /// Solid original, full mask, then one candidate per brightness shift.
    pub fn shifted(width: u32, height: u32, base: u8, shifts: &[u8]) -> Self {
        let original =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([base; 3])));
        let candidates = shifts
            .iter()
            .enumerate()
            .map(|(i, &shift)| {
                let v = base.saturating_add(shift);
                (
                    format!("{:03}-shift-{}.png", i + 1, shift),
                    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([v; 3]))),
                )
            })
            .collect();
        Self {
            original,
            mask: DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255]))),
            candidates,
        }
    }
}

/// Write `fixture` as PNGs into `root/dir_name/` and return the job directory.
pub fn write_job(root: &Path, dir_name: &str, fixture: &JobFixture) -> PathBuf {
    let dir = root.join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("original.png"), encode_png(&fixture.original)).unwrap();
    std::fs::write(dir.join("mask.png"), encode_png(&fixture.mask)).unwrap();
    for (name, img) in &fixture.candidates {
        std::fs::write(dir.join(name), encode_png(img)).unwrap();
    }
    dir
}
