//! Gate configuration module.
//!
//! Handles loading, validating, and layering `config.toml`. Values are
//! resolved in this order, each layer overriding the previous one:
//!
//! ```text
//! stock defaults  →  config.toml  →  environment  →  CLI flags
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [thresholds]
//! min_psnr = 30.0           # Minimum PSNR (dB) inside the mask
//! max_mse = 200.0           # Maximum mean squared error inside the mask
//! max_color_delta = 6.0     # Maximum mean luminance-average difference
//!
//! [normalize]
//! working_width = 512       # Common width all inputs are resized to
//! image_filter = "lanczos3" # Filter for original/candidate: nearest | bilinear | lanczos3
//! mask_resampling = "nearest" # Filter for the mask, applied before thresholding
//! mask_channel = "luma"     # luma | alpha
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Environment
//!
//! `MIN_PSNR`, `MAX_MSE` and `MAX_COLOR_DELTA` override the matching
//! `[thresholds]` keys. An unparseable value is a validation error rather
//! than a silent fallback.
//!
//! Unknown keys are rejected to catch typos early.

use crate::fidelity::Thresholds;
use crate::imaging::{MaskChannel, Resampling};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in a batch root.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variables that override `[thresholds]`.
pub const ENV_MIN_PSNR: &str = "MIN_PSNR";
pub const ENV_MAX_MSE: &str = "MAX_MSE";
pub const ENV_MAX_COLOR_DELTA: &str = "MAX_COLOR_DELTA";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Gate configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Accept/reject thresholds.
    pub thresholds: Thresholds,
    /// How inputs are brought to a common resolution.
    pub normalize: NormalizeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl GateConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("thresholds.min_psnr", t.min_psnr),
            ("thresholds.max_mse", t.max_mse),
            ("thresholds.max_color_delta", t.max_color_delta),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Validation(format!("{name} must be finite")));
            }
        }
        if t.max_mse < 0.0 {
            return Err(ConfigError::Validation(
                "thresholds.max_mse must be >= 0".into(),
            ));
        }
        if t.max_color_delta < 0.0 {
            return Err(ConfigError::Validation(
                "thresholds.max_color_delta must be >= 0".into(),
            ));
        }
        if self.normalize.working_width == Some(0) {
            return Err(ConfigError::Validation(
                "normalize.working_width must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Resolution normalization applied before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Width every input is resized to, preserving the original's aspect
    /// ratio. `None` (library use only; config files always resolve a width)
    /// compares at native resolution and requires identical dimensions.
    pub working_width: Option<u32>,
    /// Filter for resizing the original and the candidate.
    pub image_filter: Resampling,
    /// Filter for resizing the mask before it is thresholded.
    pub mask_resampling: Resampling,
    /// Channel of the mask source that marks the region.
    pub mask_channel: MaskChannel,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            working_width: Some(512),
            image_filter: Resampling::Lanczos3,
            mask_resampling: Resampling::Nearest,
            mask_channel: MaskChannel::Luma,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel verification workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(GateConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a TOML file as a raw value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_file(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<GateConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GateConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Missing file means stock defaults. Does not consult the environment; see
/// [`apply_env_overrides`].
pub fn load_config(dir: &Path) -> Result<GateConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILENAME))
}

/// Load config from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<GateConfig, ConfigError> {
    resolve_config(load_raw_file(path)?)
}

/// Where the file layer of a config comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file: stock defaults.
    Stock,
    File(PathBuf),
}

impl ConfigSource {
    /// A file named on the command line. Unlike a discovered file it must exist.
    pub fn explicit(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Ok(Self::File(path.to_path_buf()))
    }

    /// `config.toml` in `dir` if present, stock defaults otherwise.
    pub fn discover(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            Self::File(path)
        } else {
            Self::Stock
        }
    }

    pub fn load(&self) -> Result<GateConfig, ConfigError> {
        match self {
            Self::Stock => resolve_config(None),
            Self::File(path) => load_config_file(path),
        }
    }
}

/// Apply `MIN_PSNR` / `MAX_MSE` / `MAX_COLOR_DELTA` overrides.
///
/// `lookup` abstracts the environment so tests need not mutate process state;
/// production passes `|k| std::env::var(k).ok()`. The result is re-validated.
pub fn apply_env_overrides(
    mut config: GateConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GateConfig, ConfigError> {
    let parse = |key: &str| -> Result<Option<f64>, ConfigError> {
        match lookup(key) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => raw.trim().parse::<f64>().map(Some).map_err(|_| {
                ConfigError::Validation(format!("{key} must be a number, got {raw:?}"))
            }),
        }
    };
    if let Some(v) = parse(ENV_MIN_PSNR)? {
        config.thresholds.min_psnr = v;
    }
    if let Some(v) = parse(ENV_MAX_MSE)? {
        config.thresholds.max_mse = v;
    }
    if let Some(v) = parse(ENV_MAX_COLOR_DELTA)? {
        config.thresholds.max_color_delta = v;
    }
    config.validate()?;
    Ok(config)
}

/// Threshold values given on the command line; `None` keeps the config value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdOverrides {
    pub min_psnr: Option<f64>,
    pub max_mse: Option<f64>,
    pub max_color_delta: Option<f64>,
}

impl ThresholdOverrides {
    /// Apply on top of `config` (the last layer) and re-validate.
    pub fn apply(self, mut config: GateConfig) -> Result<GateConfig, ConfigError> {
        let t = &mut config.thresholds;
        if let Some(v) = self.min_psnr {
            t.min_psnr = v;
        }
        if let Some(v) = self.max_mse {
            t.max_mse = v;
        }
        if let Some(v) = self.max_color_delta {
            t.max_color_delta = v;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# fidelity-gate configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the root of a batch directory, or pass it with --config.
# Environment variables MIN_PSNR, MAX_MSE and MAX_COLOR_DELTA override the
# [thresholds] values; CLI flags override everything.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Acceptance thresholds (all must pass for a candidate to be accepted)
# ---------------------------------------------------------------------------
[thresholds]
# Minimum PSNR in dB over the masked region. Identical regions score ~168.
min_psnr = 30.0

# Maximum mean squared error per channel over the masked region.
max_mse = 200.0

# Maximum mean difference of per-pixel channel averages (0-255 scale).
max_color_delta = 6.0

# ---------------------------------------------------------------------------
# Normalization
# ---------------------------------------------------------------------------
[normalize]
# Width all three inputs are resized to, preserving the original's aspect
# ratio. Mask and candidate must share the original's aspect ratio.
working_width = 512

# Filter for the original and candidate: "nearest", "bilinear" or "lanczos3".
image_filter = "lanczos3"

# Filter for the mask before thresholding. "nearest" keeps edges binary;
# "bilinear" blends edge pixels, and only those still above 128 count.
mask_resampling = "nearest"

# Mask channel: "luma" (white = region) or "alpha" (opaque = region).
mask_channel = "luma"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel verification workers for batch runs.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
