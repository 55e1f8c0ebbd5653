//! # Fidelity Gate
//!
//! A publish gate for AI-edited product photos. Given the original photo, a
//! binary mask of the product region, and an edited candidate, it measures
//! how much the candidate changed *inside the region* and accepts the edit
//! only if the product survived.
//!
//! # Architecture
//!
//! ```text
//! fidelity::evaluate    rasters + mask  →  verdict       (pure numeric core)
//! verify::verify        encoded bytes   →  report        (decode, normalize, evaluate)
//! scan::scan            jobs/           →  manifest      (filesystem → structured data)
//! batch::process        manifest        →  report.json   (parallel, cached)
//! ```
//!
//! The numeric core never touches files or decoders and only ever sees
//! equal-sized rasters; the adapter in [`verify`] is responsible for getting
//! them there or refusing the inputs.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fidelity`] | Masked MSE, PSNR and color delta; threshold decision |
//! | [`verify`] | Decode, resize and shape-check one original/mask/candidate triple |
//! | [`imaging`] | Decoding backend, resampling parameters, RGB and mask rasters |
//! | [`scan`] | Walks a batch root into jobs with ordered candidates |
//! | [`batch`] | Verifies every job in parallel and selects the first accepted candidate |
//! | [`cache`] | Content-addressed verdict cache for incremental batch runs |
//! | [`config`] | Layered `config.toml` loading, validation and overrides |
//! | [`naming`] | `NNN-name` parser for job directories and candidate files |
//! | [`output`] | CLI output formatting |
//!
//! # Metrics
//!
//! All metrics run over in-region pixels on R, G and B:
//!
//! - **MSE**: mean of squared channel differences.
//! - **PSNR**: `10·log10(255² / (mse + 1e-12))`, so identical regions give a
//!   large finite value (about 168 dB).
//! - **Color delta**: mean absolute difference of per-pixel channel averages.
//!
//! Defaults accept when PSNR ≥ 30 dB, MSE ≤ 200 and color delta ≤ 6. A mask
//! with no in-region pixels is always rejected.
//!
//! # Example
//!
//! ```
//! use fidelity_gate::fidelity::{evaluate, Thresholds};
//! use fidelity_gate::imaging::{Image, Mask};
//!
//! let original = Image::from_raw(2, 1, vec![100, 100, 100, 100, 100, 100]).unwrap();
//! let candidate = Image::from_raw(2, 1, vec![100, 100, 100, 110, 110, 110]).unwrap();
//! // Only the left pixel is in the region, so the right pixel's change is ignored.
//! let mask = Mask::from_intensities(2, 1, &[255, 0]).unwrap();
//!
//! let verdict = evaluate(&original, &mask, &candidate, &Thresholds::default());
//! assert!(verdict.accepted);
//! assert_eq!(verdict.metrics.mse, 0.0);
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod fidelity;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod scan;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;
