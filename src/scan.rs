//! Filesystem scanning and batch manifest generation.
//!
//! Stage 1 of a batch run. Walks a directory tree to discover verification
//! jobs, producing a [`BatchManifest`] that the [`batch`](crate::batch) stage
//! consumes.
//!
//! ## Directory Structure
//!
//! ```text
//! jobs/                            # Batch root
//! ├── config.toml                  # Gate configuration (optional)
//! ├── 010-red-sneaker/             # Job (numbered = processed in order)
//! │   ├── original.jpg             # Unedited product photo
//! │   ├── mask.png                 # Product region (white = product)
//! │   ├── 001-studio.png           # Candidate variants, tried by number
//! │   └── 002-beach.png
//! └── 020-Lamps/                   # Grouping directory (no images)
//!     └── 010-desk-lamp/           # Nested job
//!         ├── original.png
//!         ├── mask.png
//!         └── warm.webp            # Unnumbered candidates go last
//! ```
//!
//! ## Rules
//!
//! - Any directory with image files directly inside it is a job.
//! - A job has exactly one `original.*` and exactly one `mask.*`.
//! - Every other image is a candidate; a job needs at least one.
//! - Candidate numbers are unique within a job.
//! - Images directly in the batch root are rejected.
//! - Dot-directories and the batch output directory are never scanned.

use crate::config::{self, GateConfig};
use crate::imaging::is_supported_image;
use crate::naming::parse_entry_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File stem identifying the unedited photo in a job directory.
pub const ORIGINAL_STEM: &str = "original";
/// File stem identifying the region mask in a job directory.
pub const MASK_STEM: &str = "mask";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Images found directly in the batch root (put each job in its own directory): {0}")]
    ImagesAtRoot(PathBuf),
    #[error("No {0}.* image in job directory: {1}")]
    MissingInput(&'static str, PathBuf),
    #[error("More than one {0}.* image in job directory: {1}")]
    DuplicateInput(&'static str, PathBuf),
    #[error("No candidate images in job directory: {0}")]
    NoCandidates(PathBuf),
    #[error("Duplicate candidate number {0} in {1}")]
    DuplicateNumber(u32, PathBuf),
}

/// Manifest output from the scan stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub jobs: Vec<Job>,
    pub config: GateConfig,
}

/// One original/mask pair with its candidate variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Directory relative to the batch root, `/`-separated.
    pub path: String,
    pub title: String,
    /// Original image path relative to the batch root.
    pub original: String,
    /// Mask image path relative to the batch root.
    pub mask: String,
    /// Candidates in the order they should be tried.
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub number: Option<u32>,
    pub title: String,
    /// Path relative to the batch root.
    pub source_path: String,
    pub filename: String,
}

/// Scan with the config found at `<root>/config.toml`.
pub fn scan(root: &Path) -> Result<BatchManifest, ScanError> {
    let config = config::load_config(root)?;
    scan_with_config(root, config, None)
}

/// Scan with an already-resolved config; `<root>/config.toml` is not read.
///
/// `output_dir` is skipped when it lies inside `root`.
pub fn scan_with_config(
    root: &Path,
    config: GateConfig,
    output_dir: Option<&Path>,
) -> Result<BatchManifest, ScanError> {
    if !list_images(root)?.is_empty() {
        return Err(ScanError::ImagesAtRoot(root.to_path_buf()));
    }

    let canonical_root = fs::canonicalize(root)?;
    let skip = output_dir.and_then(|p| fs::canonicalize(p).ok());

    let mut jobs = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            // The root itself passes through here too, despite min_depth
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            if e.file_name().to_string_lossy().starts_with('.') {
                return false;
            }
            match (&skip, e.path().strip_prefix(root)) {
                (Some(skip), Ok(rel)) => canonical_root.join(rel) != *skip,
                _ => true,
            }
        });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let images = list_images(entry.path())?;
        if images.is_empty() {
            continue;
        }
        jobs.push(build_job(root, entry.path(), images)?);
    }

    jobs.sort_by_cached_key(|job| path_sort_key(&job.path));

    Ok(BatchManifest { jobs, config })
}

/// Supported image files directly inside `dir`, sorted by name.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect();
    images.sort();
    Ok(images)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Sort key per path component so `010-x` < `020-y` < `unnumbered`.
fn path_sort_key(path: &str) -> Vec<(bool, u32, String)> {
    path.split('/')
        .map(|component| {
            let parsed = parse_entry_name(component);
            let (unnumbered, number, name) = parsed.sort_key();
            (unnumbered, number, name.to_string())
        })
        .collect()
}

fn take_single(
    images: &mut Vec<PathBuf>,
    stem: &'static str,
    dir: &Path,
) -> Result<PathBuf, ScanError> {
    let (mut matching, rest): (Vec<PathBuf>, Vec<PathBuf>) = images
        .drain(..)
        .partition(|p| file_stem(p).eq_ignore_ascii_case(stem));
    *images = rest;
    match matching.len() {
        0 => Err(ScanError::MissingInput(stem, dir.to_path_buf())),
        1 => Ok(matching.remove(0)),
        _ => Err(ScanError::DuplicateInput(stem, dir.to_path_buf())),
    }
}

fn build_job(root: &Path, dir: &Path, mut images: Vec<PathBuf>) -> Result<Job, ScanError> {
    let original = take_single(&mut images, ORIGINAL_STEM, dir)?;
    let mask = take_single(&mut images, MASK_STEM, dir)?;

    if images.is_empty() {
        return Err(ScanError::NoCandidates(dir.to_path_buf()));
    }

    let mut seen = HashSet::new();
    let mut parsed = Vec::with_capacity(images.len());
    for path in images {
        let name = parse_entry_name(&file_stem(&path));
        if let Some(n) = name.number {
            if !seen.insert(n) {
                return Err(ScanError::DuplicateNumber(n, dir.to_path_buf()));
            }
        }
        parsed.push((name, path));
    }
    parsed.sort_by(|(a, _), (b, _)| a.sort_key().cmp(&b.sort_key()));

    let candidates = parsed
        .into_iter()
        .map(|(name, path)| Candidate {
            number: name.number,
            title: if name.display_title.is_empty() {
                file_stem(&path)
            } else {
                name.display_title
            },
            source_path: relative(root, &path),
            filename: path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default(),
        })
        .collect();

    let dir_name = dir
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let parsed_dir = parse_entry_name(&dir_name);

    Ok(Job {
        path: relative(root, dir),
        title: if parsed_dir.display_title.is_empty() {
            dir_name
        } else {
            parsed_dir.display_title
        },
        original: relative(root, &original),
        mask: relative(root, &mask),
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{JobFixture, write_job};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn discovers_jobs_and_orders_candidates() {
        let tmp = TempDir::new().unwrap();
        let job = tmp.path().join("010-red-sneaker");
        for name in [
            "original.jpg",
            "mask.png",
            "studio.png",
            "010-beach.png",
            "002-warm-light.png",
            "notes.txt",
        ] {
            touch(&job.join(name));
        }

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.jobs.len(), 1);

        let job = &manifest.jobs[0];
        assert_eq!(job.path, "010-red-sneaker");
        assert_eq!(job.title, "red sneaker");
        assert_eq!(job.original, "010-red-sneaker/original.jpg");
        assert_eq!(job.mask, "010-red-sneaker/mask.png");

        let titles: Vec<&str> = job.candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["warm light", "beach", "studio"]);
        assert_eq!(job.candidates[0].number, Some(2));
        assert_eq!(job.candidates[2].number, None);
        assert_eq!(job.candidates[1].source_path, "010-red-sneaker/010-beach.png");
        assert_eq!(job.candidates[1].filename, "010-beach.png");
    }

    #[test]
    fn nested_jobs_sorted_by_number() {
        let tmp = TempDir::new().unwrap();
        for dir in ["020-Lamps/010-desk-lamp", "010-sneaker", "drafts"] {
            let d = tmp.path().join(dir);
            for name in ["original.png", "mask.png", "001-a.png"] {
                touch(&d.join(name));
            }
        }

        let manifest = scan(tmp.path()).unwrap();
        let paths: Vec<&str> = manifest.jobs.iter().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["010-sneaker", "020-Lamps/010-desk-lamp", "drafts"]);
        assert_eq!(manifest.jobs[1].title, "desk lamp");
    }

    #[test]
    fn stems_are_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path().join("job");
        for name in ["Original.PNG", "MASK.png", "001-a.png"] {
            touch(&d.join(name));
        }
        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.jobs[0].original, "job/Original.PNG");
        assert_eq!(manifest.jobs[0].candidates.len(), 1);
    }

    #[test]
    fn missing_mask_is_error() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path().join("job");
        touch(&d.join("original.png"));
        touch(&d.join("001-a.png"));

        let result = scan(tmp.path());
        assert!(matches!(result, Err(ScanError::MissingInput("mask", _))));
    }

    #[test]
    fn duplicate_original_is_error() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path().join("job");
        for name in ["original.png", "original.jpg", "mask.png", "001-a.png"] {
            touch(&d.join(name));
        }
        assert!(matches!(
            scan(tmp.path()),
            Err(ScanError::DuplicateInput("original", _))
        ));
    }

    #[test]
    fn job_without_candidates_is_error() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path().join("job");
        touch(&d.join("original.png"));
        touch(&d.join("mask.png"));
        assert!(matches!(scan(tmp.path()), Err(ScanError::NoCandidates(_))));
    }

    #[test]
    fn duplicate_candidate_number_is_error() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path().join("job");
        for name in ["original.png", "mask.png", "001-a.png", "001-b.png"] {
            touch(&d.join(name));
        }
        assert!(matches!(
            scan(tmp.path()),
            Err(ScanError::DuplicateNumber(1, _))
        ));
    }

    #[test]
    fn images_at_root_rejected() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("original.png"));
        assert!(matches!(scan(tmp.path()), Err(ScanError::ImagesAtRoot(_))));
    }

    #[test]
    fn empty_root_has_no_jobs() {
        let tmp = TempDir::new().unwrap();
        let manifest = scan(tmp.path()).unwrap();
        assert!(manifest.jobs.is_empty());
    }

    #[test]
    fn skips_output_and_hidden_directories() {
        let tmp = TempDir::new().unwrap();
        write_job(tmp.path(), "010-job", &JobFixture::identical(4, 4));
        write_job(tmp.path(), "gate-report", &JobFixture::identical(4, 4));
        write_job(tmp.path(), ".trash/010-old", &JobFixture::identical(4, 4));

        let manifest = scan_with_config(
            tmp.path(),
            GateConfig::default(),
            Some(&tmp.path().join("gate-report")),
        )
        .unwrap();
        let paths: Vec<&str> = manifest.jobs.iter().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["010-job"]);
    }

    #[test]
    fn supplied_config_skips_root_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[[[").unwrap();
        write_job(tmp.path(), "010-job", &JobFixture::identical(4, 4));
        assert!(matches!(scan(tmp.path()), Err(ScanError::Config(_))));

        let mut config = GateConfig::default();
        config.thresholds.min_psnr = 25.0;
        let manifest = scan_with_config(tmp.path(), config, None).unwrap();
        assert_eq!(manifest.config.thresholds.min_psnr, 25.0);
        assert_eq!(manifest.jobs.len(), 1);
    }

    #[test]
    fn reads_root_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[thresholds]\nmin_psnr = 40.0\n",
        )
        .unwrap();
        write_job(tmp.path(), "010-job", &JobFixture::identical(8, 8));

        let manifest = scan(tmp.path()).unwrap();
        assert_eq!(manifest.config.thresholds.min_psnr, 40.0);
        assert_eq!(manifest.jobs.len(), 1);
    }

    #[test]
    fn manifest_serializes_to_json() {
        let tmp = TempDir::new().unwrap();
        write_job(tmp.path(), "010-job", &JobFixture::identical(8, 8));
        let manifest = scan(tmp.path()).unwrap();

        let json = serde_json::to_string(&manifest).unwrap();
        let back: BatchManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.jobs[0].candidates[0].source_path, "010-job/001-same.png");
    }
}
