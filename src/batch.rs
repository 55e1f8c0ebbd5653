//! Batch verification of scanned jobs.
//!
//! Stage 2 of a batch run. Takes the [`BatchManifest`] from the scan stage,
//! verifies every candidate of every job, and picks the first accepted
//! candidate per job.
//!
//! ## Per job
//!
//! 1. Read the original and mask once and hash them.
//! 2. Verify candidates in parallel on the global rayon pool. A candidate
//!    whose verdict is in the [`VerdictCache`] is not decoded at all.
//! 3. On the coordinating thread: record verdicts, emit progress events in
//!    candidate order, and select the first accepted candidate.
//!
//! The saved cache holds only the verdicts of the current run. Entries for
//! removed or edited candidates and for old thresholds are dropped.
//!
//! A candidate that cannot be read, decoded, or aligned is recorded as
//! [`CandidateResult::Failed`] and counts as a rejection. It never aborts the
//! batch.
//!
//! ## Report
//!
//! ```text
//! report.json
//! {
//!   "thresholds": { "min_psnr": 30.0, ... },
//!   "jobs": [
//!     { "path": "010-red-sneaker", "selected": "010-red-sneaker/002-beach.png",
//!       "candidates": [ { "title": "studio", "result": { "status": "verified", ... } } ] }
//!   ]
//! }
//! ```

use crate::cache::{self, CacheStats, VerdictCache};
use crate::fidelity::Thresholds;
use crate::imaging::{ImageBackend, RustBackend};
use crate::scan::{BatchManifest, Candidate, Job};
use crate::verify::{self, VerificationReport, VerifyInput, VerifyOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source image not found: {0}")]
    SourceNotFound(PathBuf),
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    JobStarted {
        title: String,
        candidate_count: usize,
    },
    CandidateChecked {
        /// 1-based position within the job.
        index: usize,
        candidate: CandidateReport,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub thresholds: Thresholds,
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    /// Jobs that ended with a selected candidate.
    pub fn accepted_jobs(&self) -> usize {
        self.jobs.iter().filter(|j| j.selected.is_some()).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub path: String,
    pub title: String,
    pub original: String,
    pub mask: String,
    pub candidates: Vec<CandidateReport>,
    /// `source_path` of the first accepted candidate.
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub number: Option<u32>,
    pub title: String,
    pub source_path: String,
    pub result: CandidateResult,
}

impl CandidateReport {
    pub fn accepted(&self) -> bool {
        self.result.accepted()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateResult {
    Verified {
        cached: bool,
        report: VerificationReport,
    },
    Failed {
        error: String,
    },
}

impl CandidateResult {
    pub fn accepted(&self) -> bool {
        match self {
            CandidateResult::Verified { report, .. } => report.verdict.accepted,
            CandidateResult::Failed { .. } => false,
        }
    }
}

/// Result of a batch run, including cache performance.
#[derive(Debug)]
pub struct BatchResult {
    pub report: BatchReport,
    pub cache_stats: CacheStats,
}

pub fn process(
    manifest: &BatchManifest,
    source_root: &Path,
    output_dir: &Path,
    use_cache: bool,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchResult, BatchError> {
    let backend = RustBackend::new();
    process_with_backend(
        &backend,
        manifest,
        source_root,
        output_dir,
        use_cache,
        events,
    )
}

/// Process a batch using a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    manifest: &BatchManifest,
    source_root: &Path,
    output_dir: &Path,
    use_cache: bool,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchResult, BatchError> {
    std::fs::create_dir_all(output_dir)?;

    let previous = if use_cache {
        VerdictCache::load(output_dir)
    } else {
        VerdictCache::empty()
    };
    let mut verdict_cache = VerdictCache::empty();
    let mut stats = CacheStats::default();

    let options = VerifyOptions::from_gate_config(&manifest.config);
    let params_hash = cache::hash_params(&options);

    let mut jobs = Vec::with_capacity(manifest.jobs.len());
    for job in &manifest.jobs {
        if let Some(ref tx) = events {
            tx.send(BatchEvent::JobStarted {
                title: job.title.clone(),
                candidate_count: job.candidates.len(),
            })
            .ok();
        }

        let original = read_source(source_root, &job.original)?;
        let mask = read_source(source_root, &job.mask)?;
        let original_hash = cache::hash_bytes(&original);
        let mask_hash = cache::hash_bytes(&mask);

        let checked: Vec<Checked> = job
            .candidates
            .par_iter()
            .map(|candidate| {
                check_candidate(
                    backend,
                    source_root,
                    candidate,
                    (original.as_slice(), original_hash.as_str()),
                    (mask.as_slice(), mask_hash.as_str()),
                    &options,
                    &params_hash,
                    &previous,
                )
            })
            .collect();

        let mut candidates = Vec::with_capacity(checked.len());
        for (i, Checked { inputs_hash, report }) in checked.into_iter().enumerate() {
            if let CandidateResult::Verified {
                cached,
                report: verification,
            } = &report.result
            {
                if *cached {
                    stats.hit();
                } else {
                    stats.miss();
                }
                if let Some(ref hash) = inputs_hash {
                    verdict_cache.insert(hash, &params_hash, verification.clone());
                }
            }
            if let Some(ref tx) = events {
                tx.send(BatchEvent::CandidateChecked {
                    index: i + 1,
                    candidate: report.clone(),
                })
                .ok();
            }
            candidates.push(report);
        }

        jobs.push(job_report(job, candidates));
    }

    if let Err(e) = verdict_cache.save(output_dir) {
        warn!(error = %e, "could not write verdict cache");
    }

    Ok(BatchResult {
        report: BatchReport {
            thresholds: options.thresholds,
            jobs,
        },
        cache_stats: stats,
    })
}

fn read_source(source_root: &Path, relative: &str) -> Result<Vec<u8>, BatchError> {
    let path = source_root.join(relative);
    if !path.exists() {
        return Err(BatchError::SourceNotFound(path));
    }
    Ok(std::fs::read(&path)?)
}

struct Checked {
    /// Set when the candidate could be read; the cache key's input half.
    inputs_hash: Option<String>,
    report: CandidateReport,
}

#[allow(clippy::too_many_arguments)]
fn check_candidate(
    backend: &impl ImageBackend,
    source_root: &Path,
    candidate: &Candidate,
    (original, original_hash): (&[u8], &str),
    (mask, mask_hash): (&[u8], &str),
    options: &VerifyOptions,
    params_hash: &str,
    verdict_cache: &VerdictCache,
) -> Checked {
    let entry = |result| CandidateReport {
        number: candidate.number,
        title: candidate.title.clone(),
        source_path: candidate.source_path.clone(),
        result,
    };

    let bytes = match std::fs::read(source_root.join(&candidate.source_path)) {
        Ok(b) => b,
        Err(e) => {
            warn!(candidate = %candidate.source_path, error = %e, "candidate unreadable");
            return Checked {
                inputs_hash: None,
                report: entry(CandidateResult::Failed {
                    error: e.to_string(),
                }),
            };
        }
    };
    let inputs_hash = cache::hash_inputs(original_hash, mask_hash, &cache::hash_bytes(&bytes));

    if let Some(report) = verdict_cache.get(&inputs_hash, params_hash) {
        debug!(candidate = %candidate.source_path, "verdict cache hit");
        return Checked {
            inputs_hash: Some(inputs_hash),
            report: entry(CandidateResult::Verified {
                cached: true,
                report: report.clone(),
            }),
        };
    }

    let input = VerifyInput {
        original,
        mask,
        candidate: &bytes,
    };
    let result = match verify::verify_with_backend(backend, input, options) {
        Ok(report) => CandidateResult::Verified {
            cached: false,
            report,
        },
        Err(e) => {
            warn!(candidate = %candidate.source_path, error = %e, "candidate rejected without a verdict");
            CandidateResult::Failed {
                error: e.to_string(),
            }
        }
    };
    Checked {
        inputs_hash: Some(inputs_hash),
        report: entry(result),
    }
}

fn job_report(job: &Job, candidates: Vec<CandidateReport>) -> JobReport {
    let selected = candidates
        .iter()
        .find(|c| c.accepted())
        .map(|c| c.source_path.clone());
    JobReport {
        path: job.path.clone(),
        title: job.title.clone(),
        original: job.original.clone(),
        mask: job.mask.clone(),
        candidates,
        selected,
    }
}
