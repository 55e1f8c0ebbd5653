//! Decode, normalize, and verify one candidate against its original.
//!
//! This is the boundary in front of [`fidelity::evaluate`]: it accepts
//! encoded byte buffers, brings all three rasters to a common working
//! resolution, and refuses inputs whose geometry cannot line up. The numeric
//! core only ever sees equal-sized rasters.
//!
//! ## Steps
//!
//! 1. Identify and decode original, mask, and candidate through an
//!    [`ImageBackend`].
//! 2. Derive the working size from the original
//!    ([`calculate_working_dimensions`]).
//! 3. Check that mask and candidate share the original's aspect ratio at the
//!    working width ([`shapes_agree`]); otherwise [`VerifyError::ShapeMismatch`].
//! 4. Resize photos with `image_filter`, the mask with `mask_resampling`,
//!    then threshold the mask.
//! 5. Score with [`fidelity::evaluate`].

use crate::config::{GateConfig, NormalizeConfig};
use crate::fidelity::{self, FidelityVerdict, Thresholds};
use crate::imaging::{
    BackendError, Dimensions, Image, ImageBackend, Mask, ResizeParams, RustBackend, SourceInfo,
    calculate_working_dimensions, shapes_agree,
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Image decoding failed for {input}: {source}")]
    Imaging {
        input: InputRole,
        #[source]
        source: BackendError,
    },
    #[error("{input} is {actual}, which does not line up with the {expected} original")]
    ShapeMismatch {
        input: InputRole,
        expected: Dimensions,
        actual: Dimensions,
    },
}

/// Which of the three inputs an error or report entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    Original,
    Mask,
    Candidate,
}

impl fmt::Display for InputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputRole::Original => "original",
            InputRole::Mask => "mask",
            InputRole::Candidate => "candidate",
        })
    }
}

/// Encoded inputs for one verification.
#[derive(Debug, Clone, Copy)]
pub struct VerifyInput<'a> {
    pub original: &'a [u8],
    pub mask: &'a [u8],
    pub candidate: &'a [u8],
}

/// Everything a verification needs besides the inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOptions {
    pub thresholds: Thresholds,
    pub normalize: NormalizeConfig,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::from_gate_config(&GateConfig::default())
    }
}

impl VerifyOptions {
    pub fn from_gate_config(config: &GateConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            normalize: config.normalize.clone(),
        }
    }
}

/// Result of a verification: the verdict plus what was compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub original: SourceInfo,
    pub mask: SourceInfo,
    pub candidate: SourceInfo,
    /// Resolution the comparison ran at.
    pub working: Dimensions,
    /// In-region pixels after thresholding at the working resolution.
    pub mask_coverage: u64,
    pub verdict: FidelityVerdict,
}

/// Verify with the default [`RustBackend`].
pub fn verify(
    input: VerifyInput<'_>,
    options: &VerifyOptions,
) -> Result<VerificationReport, VerifyError> {
    verify_with_backend(&RustBackend::new(), input, options)
}

/// Verify using a specific backend (allows testing with mock).
pub fn verify_with_backend(
    backend: &impl ImageBackend,
    input: VerifyInput<'_>,
    options: &VerifyOptions,
) -> Result<VerificationReport, VerifyError> {
    let (original_info, original_img) = load(backend, input.original, InputRole::Original)?;
    let (mask_info, mask_img) = load(backend, input.mask, InputRole::Mask)?;
    let (candidate_info, candidate_img) = load(backend, input.candidate, InputRole::Candidate)?;

    let normalize = &options.normalize;
    let native = original_info.dimensions;
    let working: Dimensions =
        calculate_working_dimensions(native.as_tuple(), normalize.working_width).into();

    for (role, info) in [
        (InputRole::Mask, &mask_info),
        (InputRole::Candidate, &candidate_info),
    ] {
        if !shapes_agree(
            native.as_tuple(),
            info.dimensions.as_tuple(),
            normalize.working_width,
        ) {
            return Err(VerifyError::ShapeMismatch {
                input: role,
                expected: native,
                actual: info.dimensions,
            });
        }
    }

    let photo = ResizeParams {
        width: working.width,
        height: working.height,
        filter: normalize.image_filter,
    };
    let original = Image::from_dynamic(&backend.resize(&original_img, &photo));
    let candidate = Image::from_dynamic(&backend.resize(&candidate_img, &photo));
    let mask = Mask::from_dynamic(
        &backend.resize(
            &mask_img,
            &ResizeParams {
                filter: normalize.mask_resampling,
                ..photo
            },
        ),
        normalize.mask_channel,
    );

    let verdict = fidelity::evaluate(&original, &mask, &candidate, &options.thresholds);
    debug!(
        %working,
        coverage = mask.coverage(),
        mse = verdict.metrics.mse,
        psnr = verdict.metrics.psnr,
        color_delta = verdict.metrics.avg_color_delta,
        accepted = verdict.accepted,
        "fidelity verdict"
    );

    Ok(VerificationReport {
        original: original_info,
        mask: mask_info,
        candidate: candidate_info,
        working,
        mask_coverage: mask.coverage() as u64,
        verdict,
    })
}

fn load(
    backend: &impl ImageBackend,
    bytes: &[u8],
    role: InputRole,
) -> Result<(SourceInfo, DynamicImage), VerifyError> {
    let wrap = |source| VerifyError::Imaging {
        input: role,
        source,
    };
    let info = backend.identify(bytes).map_err(wrap)?;
    let img = backend.decode(bytes).map_err(wrap)?;
    Ok((info, img))
}
