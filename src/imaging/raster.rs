//! Decoded rasters consumed by the fidelity check.
//!
//! [`Image`] is an 8-bit RGB buffer; any alpha channel is dropped on
//! construction because the check never looks at it. [`Mask`] is a binary
//! per-pixel region indicator produced by thresholding an arbitrary
//! grayscale or alpha source at [`MASK_THRESHOLD`].
//!
//! Both are immutable once built.

use super::params::MaskChannel;
use image::{DynamicImage, RgbImage};

/// Intensity above which a mask pixel is in-region. The comparison is strict:
/// a pixel of exactly 128 is out-of-region.
pub const MASK_THRESHOLD: u8 = 128;

/// An 8-bit RGB raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pixels: RgbImage,
}

impl Image {
    /// Convert any decoded image (RGBA, grayscale, 16-bit, ...) to 8-bit RGB.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        Self {
            pixels: img.to_rgb8(),
        }
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Build from raw interleaved RGB bytes. Returns `None` when the buffer
    /// length is not `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, rgb: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, rgb).map(Self::from_rgb)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// RGB channels at `(x, y)`. Panics when out of bounds, like
    /// [`RgbImage::get_pixel`].
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels.get_pixel(x, y).0
    }
}

/// A binary region mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// Threshold a decoded image into a mask using the given channel.
    pub fn from_dynamic(img: &DynamicImage, channel: MaskChannel) -> Self {
        let (width, height) = (img.width(), img.height());
        let bits = match channel {
            MaskChannel::Luma => img
                .to_luma8()
                .pixels()
                .map(|p| p.0[0] > MASK_THRESHOLD)
                .collect(),
            MaskChannel::Alpha => img
                .to_luma_alpha8()
                .pixels()
                .map(|p| p.0[1] > MASK_THRESHOLD)
                .collect(),
        };
        Self {
            width,
            height,
            bits,
        }
    }

    /// Threshold a row-major buffer of intensities. Returns `None` when the
    /// buffer length is not `width * height`.
    pub fn from_intensities(width: u32, height: u32, intensities: &[u8]) -> Option<Self> {
        if intensities.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            bits: intensities.iter().map(|&v| v > MASK_THRESHOLD).collect(),
        })
    }

    /// Build a mask by evaluating `f` at every position.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.bits[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Number of in-region pixels.
    pub fn coverage(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }
}
