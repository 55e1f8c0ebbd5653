//! Masked fidelity check between an original photo and an edited candidate.
//!
//! Given the original, a binary region mask, and a candidate, [`evaluate`]
//! measures how much the candidate changed *inside* the region and decides
//! whether the edit preserved the subject well enough to publish.
//!
//! ## Metrics
//!
//! All three are computed over in-region pixels only, on the R, G and B
//! channels (alpha never participates):
//!
//! | Metric | Formula |
//! |---|---|
//! | MSE | `Σ (o_c − c_c)² / (pixels × 3)` |
//! | PSNR | `10 · log10(255² / (mse + ε))`, ε = [`PSNR_EPSILON`] |
//! | Color delta | `Σ |mean(o_rgb) − mean(c_rgb)| / pixels` |
//!
//! The color delta is a plain luminance-average difference, not a CIE Lab
//! Delta-E. It is cheap and catches global tint or brightness drift, which is
//! the failure mode of background-replacement edits.
//!
//! ## Verdict
//!
//! The candidate is accepted iff `psnr >= min_psnr`, `mse <= max_mse` and
//! `color_delta <= max_color_delta` all hold. A mask with no in-region pixels
//! is always rejected: there is nothing to verify, so the gate fails closed.
//!
//! ## Geometry
//!
//! [`evaluate`] walks the extent common to all three rasters and never reads
//! out of bounds, but it does not align anything. Equal dimensions are the
//! caller's job; [`verify`](crate::verify) resizes and validates shapes
//! before calling in here.

use crate::imaging::{Image, Mask};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Added to MSE before dividing so identical regions yield a large finite
/// PSNR instead of infinity.
pub const PSNR_EPSILON: f64 = 1e-12;

/// Peak value of an 8-bit channel.
pub const MAX_CHANNEL_VALUE: f64 = 255.0;

/// Channels compared per pixel (R, G, B).
const CHANNELS: u64 = 3;

/// Compute PSNR (dB) for a given MSE on 8-bit channels.
pub fn psnr_from_mse(mse: f64) -> f64 {
    10.0 * (MAX_CHANNEL_VALUE * MAX_CHANNEL_VALUE / (mse + PSNR_EPSILON)).log10()
}

/// PSNR of a perfect match, about 168.13 dB.
pub fn max_finite_psnr() -> f64 {
    psnr_from_mse(0.0)
}

/// Acceptance thresholds for a fidelity check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Minimum acceptable PSNR in dB.
    pub min_psnr: f64,
    /// Maximum acceptable mean squared error.
    pub max_mse: f64,
    /// Maximum acceptable mean luminance-average difference (0–255 scale).
    pub max_color_delta: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_psnr: 30.0,
            max_mse: 200.0,
            max_color_delta: 6.0,
        }
    }
}

impl Thresholds {
    /// Return every metric that falls outside its threshold, in
    /// PSNR → MSE → color delta order. Empty means accept.
    pub fn check(&self, metrics: &FidelityMetrics) -> Vec<Metric> {
        let mut failed = Vec::new();
        // Negated comparisons so a NaN metric counts as a failure
        if !(metrics.psnr >= self.min_psnr) {
            failed.push(Metric::Psnr);
        }
        if !(metrics.mse <= self.max_mse) {
            failed.push(Metric::Mse);
        }
        if !(metrics.avg_color_delta <= self.max_color_delta) {
            failed.push(Metric::ColorDelta);
        }
        failed
    }
}

/// One of the three scored metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Psnr,
    Mse,
    ColorDelta,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Psnr => "PSNR",
            Metric::Mse => "MSE",
            Metric::ColorDelta => "color delta",
        })
    }
}

/// Scalar error metrics over the masked region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FidelityMetrics {
    pub mse: f64,
    pub psnr: f64,
    pub avg_color_delta: f64,
}

/// Why a verdict came out the way it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    /// The mask selected no pixels; metrics are zero and were not scored.
    EmptyMask,
    /// At least one metric fell outside its threshold.
    OutOfTolerance { failed: Vec<Metric> },
}

/// Accept/reject decision plus the metrics that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityVerdict {
    pub accepted: bool,
    pub metrics: FidelityMetrics,
    /// Number of in-region pixels that were compared.
    pub compared_pixels: u64,
    pub outcome: Outcome,
}

impl FidelityVerdict {
    fn empty_mask() -> Self {
        Self {
            accepted: false,
            metrics: FidelityMetrics::default(),
            compared_pixels: 0,
            outcome: Outcome::EmptyMask,
        }
    }
}

#[inline]
fn channel_mean(rgb: [u8; 3]) -> f64 {
    (rgb[0] as f64 + rgb[1] as f64 + rgb[2] as f64) / 3.0
}

/// Score `candidate` against `original` inside `mask` and decide.
///
/// Pure and allocation-free apart from the returned verdict; safe to call
/// concurrently from any number of threads.
pub fn evaluate(
    original: &Image,
    mask: &Mask,
    candidate: &Image,
    thresholds: &Thresholds,
) -> FidelityVerdict {
    let width = original.width().min(mask.width()).min(candidate.width());
    let height = original.height().min(mask.height()).min(candidate.height());

    // 255² × 3 per pixel: u64 holds this for any realistic raster
    let mut sum_squared_error: u64 = 0;
    let mut color_delta_sum: f64 = 0.0;
    let mut count: u64 = 0;

    for y in 0..height {
        for x in 0..width {
            if !mask.contains(x, y) {
                continue;
            }
            let o = original.rgb(x, y);
            let c = candidate.rgb(x, y);
            for ch in 0..3 {
                let d = o[ch].abs_diff(c[ch]) as u64;
                sum_squared_error += d * d;
            }
            color_delta_sum += (channel_mean(o) - channel_mean(c)).abs();
            count += 1;
        }
    }

    if count == 0 {
        return FidelityVerdict::empty_mask();
    }

    let mse = sum_squared_error as f64 / (count * CHANNELS) as f64;
    let metrics = FidelityMetrics {
        mse,
        psnr: psnr_from_mse(mse),
        avg_color_delta: color_delta_sum / count as f64,
    };

    let failed = thresholds.check(&metrics);
    let (accepted, outcome) = if failed.is_empty() {
        (true, Outcome::Accepted)
    } else {
        (false, Outcome::OutOfTolerance { failed })
    };

    FidelityVerdict {
        accepted,
        metrics,
        compared_pixels: count,
        outcome,
    }
}
