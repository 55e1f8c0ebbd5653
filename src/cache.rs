//! Verdict cache for incremental batch runs.
//!
//! Decoding and resampling three images per candidate dominates batch time.
//! This module lets the batch stage skip verification when the inputs and
//! the verification parameters are unchanged since the last run.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: job renames, candidate renumbers, and
//! moving the batch root do not invalidate it. Only input content or
//! parameter changes do.
//!
//! - **`inputs_hash`**: SHA-256 over the SHA-256 digests of the original,
//!   mask, and candidate files, in that order. Content-based rather than
//!   mtime-based so it survives `git checkout`.
//!
//! - **`params_hash`**: SHA-256 of thresholds, working width, both resampling
//!   filters, and the mask channel. Changing any config value re-verifies.
//!
//! ## Storage
//!
//! A JSON file at `<output_dir>/.verdict-cache.json`, next to `report.json`.
//! Missing, corrupt, or version-mismatched files load as an empty cache.
//!
//! Each batch run writes a fresh cache holding only the verdicts it looked up
//! or computed, so the file tracks the live candidates and current
//! parameters instead of growing across runs.
//!
//! ## Bypassing the cache
//!
//! `batch --no-cache` starts from [`VerdictCache::empty`]; the file is
//! overwritten with fresh results at the end of the run.

use crate::verify::{VerificationReport, VerifyOptions};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache file within the output directory.
const CACHE_FILENAME: &str = ".verdict-cache.json";

/// Version of the cache format. Bump this to invalidate all existing caches
/// when the format, key computation, or metric math changes.
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VerdictCache {
    pub version: u32,
    /// `"{inputs_hash}:{params_hash}"` → stored report.
    pub entries: HashMap<String, VerificationReport>,
}

impl VerdictCache {
    /// Create an empty cache (used for `--no-cache` or a first run).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed.
    pub fn load(output_dir: &Path) -> Self {
        let path = cache_path(output_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        if cache.version != CACHE_VERSION {
            return Self::empty();
        }
        cache
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(cache_path(output_dir), json)
    }

    pub fn get(&self, inputs_hash: &str, params_hash: &str) -> Option<&VerificationReport> {
        self.entries.get(&content_key(inputs_hash, params_hash))
    }

    pub fn insert(&mut self, inputs_hash: &str, params_hash: &str, report: VerificationReport) {
        self.entries
            .insert(content_key(inputs_hash, params_hash), report);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn content_key(inputs_hash: &str, params_hash: &str) -> String {
    format!("{}:{}", inputs_hash, params_hash)
}

/// SHA-256 of a buffer, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Combine per-file digests into the inputs key.
///
/// Takes digests rather than bytes so a job's original and mask are hashed
/// once and reused for every candidate.
pub fn hash_inputs(original_hash: &str, mask_hash: &str, candidate_hash: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [original_hash, mask_hash, candidate_hash] {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of everything in [`VerifyOptions`] that affects a verdict.
pub fn hash_params(options: &VerifyOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"verify\0");
    let t = &options.thresholds;
    hasher.update(t.min_psnr.to_le_bytes());
    hasher.update(t.max_mse.to_le_bytes());
    hasher.update(t.max_color_delta.to_le_bytes());
    let n = &options.normalize;
    match n.working_width {
        Some(w) => {
            hasher.update(b"\x01");
            hasher.update(w.to_le_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
    for name in [
        n.image_filter.as_str(),
        n.mask_resampling.as_str(),
        n.mask_channel.as_str(),
    ] {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} verified ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} verified", self.misses)
        }
    }
}

/// Resolve the cache file path for an output directory.
pub fn cache_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fidelity::{FidelityMetrics, FidelityVerdict, Outcome};
    use crate::imaging::{Dimensions, Resampling, SourceInfo};
    use std::fs;
    use tempfile::TempDir;

    fn report(mse: f64) -> VerificationReport {
        let info = SourceInfo {
            format: "png".into(),
            byte_len: 10,
            dimensions: Dimensions {
                width: 4,
                height: 4,
            },
        };
        VerificationReport {
            original: info.clone(),
            mask: info.clone(),
            candidate: info,
            working: Dimensions {
                width: 4,
                height: 4,
            },
            mask_coverage: 16,
            verdict: FidelityVerdict {
                accepted: true,
                metrics: FidelityMetrics {
                    mse,
                    psnr: 40.0,
                    avg_color_delta: 1.0,
                },
                compared_pixels: 16,
                outcome: Outcome::Accepted,
            },
        }
    }

    // =========================================================================
    // VerdictCache basics
    // =========================================================================

    #[test]
    fn empty_cache_has_no_entries() {
        let c = VerdictCache::empty();
        assert_eq!(c.version, CACHE_VERSION);
        assert!(c.is_empty());
    }

    #[test]
    fn get_hit() {
        let mut c = VerdictCache::empty();
        c.insert("in", "prm", report(1.0));
        assert_eq!(c.get("in", "prm"), Some(&report(1.0)));
    }

    #[test]
    fn get_miss_wrong_params() {
        let mut c = VerdictCache::empty();
        c.insert("in", "prm_a", report(1.0));
        assert_eq!(c.get("in", "prm_b"), None);
    }

    #[test]
    fn insert_replaces_same_key() {
        let mut c = VerdictCache::empty();
        c.insert("in", "prm", report(1.0));
        c.insert("in", "prm", report(2.0));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("in", "prm").unwrap().verdict.metrics.mse, 2.0);
    }

    // =========================================================================
    // Save / Load
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut c = VerdictCache::empty();
        c.insert("a", "p", report(3.5));
        c.save(tmp.path()).unwrap();

        let loaded = VerdictCache::load(tmp.path());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("a", "p"), Some(&report(3.5)));
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(VerdictCache::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(cache_path(tmp.path()), "not json").unwrap();
        assert!(VerdictCache::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(r#"{{"version": {}, "entries": {{}}}}"#, CACHE_VERSION + 1);
        fs::write(cache_path(tmp.path()), json).unwrap();
        let c = VerdictCache::load(tmp.path());
        assert_eq!(c.version, CACHE_VERSION);
        assert!(c.is_empty());
    }

    // =========================================================================
    // Hash functions
    // =========================================================================

    #[test]
    fn hash_bytes_is_sha256_hex() {
        let h = hash_bytes(b"hello world");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn hash_inputs_depends_on_order() {
        assert_ne!(hash_inputs("a", "b", "c"), hash_inputs("b", "a", "c"));
        assert_eq!(hash_inputs("a", "b", "c"), hash_inputs("a", "b", "c"));
    }

    #[test]
    fn hash_params_deterministic() {
        let o = VerifyOptions::default();
        assert_eq!(hash_params(&o), hash_params(&o.clone()));
    }

    #[test]
    fn hash_params_varies_with_threshold() {
        let a = VerifyOptions::default();
        let mut b = a.clone();
        b.thresholds.min_psnr = 31.0;
        assert_ne!(hash_params(&a), hash_params(&b));
    }

    #[test]
    fn hash_params_varies_with_working_width() {
        let a = VerifyOptions::default();
        let mut b = a.clone();
        b.normalize.working_width = None;
        assert_ne!(hash_params(&a), hash_params(&b));
    }

    #[test]
    fn hash_params_varies_with_mask_resampling() {
        let a = VerifyOptions::default();
        let mut b = a.clone();
        b.normalize.mask_resampling = Resampling::Bilinear;
        assert_ne!(hash_params(&a), hash_params(&b));
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats { hits: 5, misses: 2 };
        assert_eq!(format!("{}", s), "5 cached, 2 verified (7 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let s = CacheStats { hits: 0, misses: 3 };
        assert_eq!(format!("{}", s), "3 verified");
    }
}
