// src/batch.rs
//
// File-set driver: collects inputs, runs one job per file on a bounded
// worker pool and reports per-file outcomes.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

use crate::error::ElecPhysError;
use crate::io::write_atomic;

/// What a failed file does to the rest of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure and keep processing sibling files
    #[default]
    Continue,
    /// Stop scheduling new files after the first failure
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = ElecPhysError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" | "skip" => Ok(Self::Continue),
            "abort" | "fail-fast" => Ok(Self::Abort),
            other => Err(ElecPhysError::validation(format!(
                "unknown failure policy '{}'",
                other
            ))),
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Files with `extension` under `path` (or `path` itself), sorted.
pub fn collect_inputs(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if !has_extension(path, extension) {
            bail!("{} is not a .{} file", path.display(), extension);
        }
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("input path {} does not exist", path.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), extension))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// `<output_dir>/<input stem><suffix>.<extension>`
pub fn output_path(input: &Path, output_dir: &Path, suffix: &str, extension: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .with_context(|| format!("{} has no file name", input.display()))?;
    Ok(output_dir.join(format!("{}{}.{}", stem.to_string_lossy(), suffix, extension)))
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads; `None` uses the available parallelism
    pub workers: Option<usize>,
    pub policy: FailurePolicy,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: None,
            policy: FailurePolicy::Continue,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub input: PathBuf,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub input: PathBuf,
    pub error: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub processed: Vec<ProcessedFile>,
    pub failed: Vec<FailedFile>,
    /// Files never started because an earlier failure aborted the run
    pub skipped: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn elapsed_secs(&self) -> f64 {
        (self.finished - self.started).num_milliseconds() as f64 / 1000.0
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_atomic(path, |file| {
            let mut writer = std::io::BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
            Ok(())
        })
        .with_context(|| format!("writing batch summary {}", path.display()))
    }
}

enum Outcome {
    Done(ProcessedFile),
    Failed(FailedFile),
    Skipped(PathBuf),
}

/// Run `job` once per input on a dedicated pool.
///
/// Each job owns one file end-to-end and returns the paths it wrote. A
/// failing job never affects its siblings under `FailurePolicy::Continue`;
/// under `Abort`, files not yet started are skipped.
pub fn run<F>(inputs: &[PathBuf], options: &BatchOptions, job: F) -> Result<BatchSummary>
where
    F: Fn(&Path) -> Result<Vec<PathBuf>> + Send + Sync,
{
    let started = Local::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.unwrap_or(0))
        .thread_name(|i| format!("elecphys-worker-{}", i))
        .build()
        .context("failed to create worker pool")?;

    let progress = if options.show_progress {
        let bar = ProgressBar::new(inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} files")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let abort = AtomicBool::new(false);
    let outcomes: Vec<Outcome> = pool.install(|| {
        inputs
            .par_iter()
            .progress_with(progress.clone())
            .map(|input| {
                if abort.load(Ordering::SeqCst) {
                    log::warn!("Skipping {} after an earlier failure", input.display());
                    return Outcome::Skipped(input.clone());
                }
                log::info!("Processing {}", input.display());
                match job(input.as_path()) {
                    Ok(outputs) => Outcome::Done(ProcessedFile {
                        input: input.clone(),
                        outputs,
                    }),
                    Err(e) => {
                        log::error!("{}: {:#}", input.display(), e);
                        if options.policy == FailurePolicy::Abort {
                            abort.store(true, Ordering::SeqCst);
                        }
                        Outcome::Failed(FailedFile {
                            input: input.clone(),
                            error: format!("{:#}", e),
                        })
                    }
                }
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut summary = BatchSummary {
        started,
        finished: Local::now(),
        processed: Vec::new(),
        failed: Vec::new(),
        skipped: Vec::new(),
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Done(p) => summary.processed.push(p),
            Outcome::Failed(f) => summary.failed.push(f),
            Outcome::Skipped(p) => summary.skipped.push(p),
        }
    }
    Ok(summary)
}
