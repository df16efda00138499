// src/cli/mod.rs
//
// Command-line interface module

mod args;
mod output;

pub use args::{parse_band, Cli, Command, FilterArgs, FolderArgs, WindowArgs};
pub use output::{print_filter_response, print_summary};

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::batch::{self, BatchOptions, BatchSummary, FailurePolicy};
use crate::config::PipelineConfig;
use crate::core::analysis::{
    butterworth_filter, dft, filter_response, normalize_min_max, notch_filter, re_reference, stft,
    zscore_normalize, BandPowerAggregator, ReferenceSpec, DEFAULT_RESPONSE_POINTS,
};
use crate::core::params::{ChannelSelection, FilterSpec};
use crate::core::record::TimeSeriesRecord;
use crate::io::{self, FilterResponseExport};

impl Cli {
    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            workers: self.workers,
            policy: if self.fail_fast {
                FailurePolicy::Abort
            } else {
                FailurePolicy::Continue
            },
            show_progress: !self.quiet,
        }
    }
}

/// Run the parsed command. Returns `false` when some input failed.
pub fn run(cli: &Cli) -> Result<bool> {
    let summary = match &cli.command {
        Command::ConvertMat {
            input,
            output,
            notch_freq,
            quality,
        } => {
            let inputs = batch::collect_inputs(input, "mat")?;
            fs::create_dir_all(output)
                .with_context(|| format!("creating output folder {}", output.display()))?;
            batch::run(&inputs, &cli.batch_options(), |path| {
                let out = io::convert_mat_to_npz(path, output, *notch_freq, *quality)
                    .with_context(|| format!("converting {}", path.display()))?;
                Ok(vec![out])
            })?
        }
        Command::Notch { io: dirs, freq, quality } => {
            let spec = FilterSpec::notch(*freq, *quality)?;
            map_records(cli, dirs, "_notch", |rec| notch_filter(rec, &spec))?
        }
        Command::Rereference {
            io: dirs,
            reference_channel,
            ignore_channels,
        } => {
            let reference = ReferenceSpec {
                channel: *reference_channel,
                ignore_channels: ignore_channels.clone(),
            };
            map_records(cli, dirs, "_reref", |rec| re_reference(rec, &reference))?
        }
        Command::Normalize { io: dirs, low, high } => {
            map_records(cli, dirs, "_norm", |rec| normalize_min_max(rec, *low, *high))?
        }
        Command::Zscore { io: dirs } => map_records(cli, dirs, "_zscore", zscore_normalize)?,
        Command::Filter { io: dirs, filter } => {
            let spec = filter.spec()?;
            let rate = OnceLock::new();
            let summary = map_records(cli, dirs, "_filtered", |rec| {
                let filtered = butterworth_filter(rec, &spec)?;
                let first = *rate.get_or_init(|| rec.fs());
                if first != rec.fs() {
                    log::warn!(
                        "Record at {} Hz differs from the {} Hz used for the response export",
                        rec.fs(),
                        first
                    );
                }
                Ok(filtered)
            })?;
            if let Some(&fs_hz) = rate.get() {
                write_response_export(&spec, fs_hz, &dirs.output.join(FILTER_RESPONSE_FILE))?;
            }
            summary
        }
        Command::Stft { io: dirs, window } => {
            let spec = window.spec()?;
            run_folder(cli, dirs, |path| {
                let record = read(path)?;
                let frame = stft(&record, &spec)?;
                let dest = batch::output_path(path, &dirs.output, "_stft", "npz")?;
                io::write_spectral(&dest, &frame)?;
                Ok(vec![dest])
            })?
        }
        Command::Dft { io: dirs } => run_folder(cli, dirs, |path| {
            let record = read(path)?;
            let frame = dft(&record)?;
            let dest = batch::output_path(path, &dirs.output, "_dft", "npz")?;
            io::write_spectral(&dest, &frame)?;
            Ok(vec![dest])
        })?,
        Command::FilterResponse {
            filter,
            fs: rate,
            points,
            output,
        } => {
            let spec = filter.spec()?;
            let response = filter_response(&spec, *rate, *points)?;
            let export = FilterResponseExport::new(spec, *rate, response);
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            io::write_filter_response_json(output, &export)
                .with_context(|| format!("writing {}", output.display()))?;
            print_filter_response(&export, output);
            return Ok(true);
        }
        Command::BandPower {
            io: dirs,
            from_stft,
            window,
            bands,
            preset,
            channels,
            ignore_channels,
            mode,
            t_min,
            t_max,
        } => {
            let bands = if bands.is_empty() {
                preset.bands()
            } else {
                bands.clone()
            };
            let selection = ChannelSelection {
                include: channels.clone(),
                ignore: ignore_channels.clone(),
            };
            let aggregator = BandPowerAggregator::new(bands)
                .channels(selection)
                .mode(*mode)
                .time_range(*t_min, *t_max);
            let window = window.spec()?;
            run_folder(cli, dirs, |path| {
                let series = if *from_stft {
                    let frame = io::read_spectral(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    aggregator.compute(&frame)?
                } else {
                    aggregator.compute_from_record(&read(path)?, &window)?
                };
                let dest = batch::output_path(path, &dirs.output, "_bandpower", "csv")?;
                io::write_band_power_csv(&dest, &series)?;
                Ok(vec![dest])
            })?
        }
        Command::Run {
            io: dirs,
            config,
            print_config,
        } => {
            let mut config = PipelineConfig::load(config.as_deref())?;
            if cli.workers.is_some() {
                config.workers = cli.workers;
            }
            if cli.fail_fast {
                config.failure_policy = FailurePolicy::Abort;
            }
            if *print_config {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(true);
            }
            run_pipeline(cli, dirs, &config)?
        }
    };

    print_summary(&summary, cli.verbose > 0);
    if let Some(path) = &cli.summary {
        summary.write_json(path)?;
    }
    Ok(summary.is_success())
}

/// Response of the design used by `filter`, written next to the filtered records
pub const FILTER_RESPONSE_FILE: &str = "filter_freq_response.json";

fn write_response_export(spec: &FilterSpec, fs_hz: f64, path: &Path) -> Result<()> {
    let response = filter_response(spec, fs_hz, DEFAULT_RESPONSE_POINTS)?;
    let export = FilterResponseExport::new(*spec, fs_hz, response);
    io::write_filter_response_json(path, &export)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote filter response to {}", path.display());
    Ok(())
}

fn read(path: &Path) -> Result<TimeSeriesRecord> {
    io::read_record(path).with_context(|| format!("reading {}", path.display()))
}

fn run_folder<F>(cli: &Cli, dirs: &FolderArgs, job: F) -> Result<BatchSummary>
where
    F: Fn(&Path) -> Result<Vec<PathBuf>> + Send + Sync,
{
    run_folder_with(dirs, &cli.batch_options(), job)
}

fn run_folder_with<F>(dirs: &FolderArgs, options: &BatchOptions, job: F) -> Result<BatchSummary>
where
    F: Fn(&Path) -> Result<Vec<PathBuf>> + Send + Sync,
{
    let inputs = batch::collect_inputs(&dirs.input, "npz")?;
    fs::create_dir_all(&dirs.output)
        .with_context(|| format!("creating output folder {}", dirs.output.display()))?;
    log::info!("Found {} record(s) under {}", inputs.len(), dirs.input.display());
    batch::run(&inputs, options, job)
}

/// Apply a record-to-record stage to every input and write `<stem><suffix>.npz`.
fn map_records<F>(cli: &Cli, dirs: &FolderArgs, suffix: &str, stage: F) -> Result<BatchSummary>
where
    F: Fn(&TimeSeriesRecord) -> crate::Result<TimeSeriesRecord> + Send + Sync,
{
    run_folder(cli, dirs, |path| {
        let record = read(path)?;
        let out = stage(&record)?;
        let dest = batch::output_path(path, &dirs.output, suffix, "npz")?;
        io::write_record(&dest, &out)?;
        Ok(vec![dest])
    })
}

fn run_pipeline(cli: &Cli, dirs: &FolderArgs, config: &PipelineConfig) -> Result<BatchSummary> {
    let pipeline = config.pipeline()?;
    run_folder_with(dirs, &config.batch_options(!cli.quiet), |path| {
        let record = read(path)?;
        let output = pipeline.process(&record)?;

        let mut written = Vec::new();
        let table = batch::output_path(path, &dirs.output, "_bandpower", "csv")?;
        io::write_band_power_csv(&table, &output.band_power)?;
        written.push(table);

        if config.save_spectral {
            let spectral = batch::output_path(path, &dirs.output, "_stft", "npz")?;
            io::write_spectral(&spectral, &output.spectral)?;
            written.push(spectral);
        }
        Ok(written)
    })
}
