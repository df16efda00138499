//! CLI argument definitions

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::BandPreset;
use crate::core::analysis::AggregationMode;
use crate::core::dsp::WindowFunction;
use crate::core::params::{FilterSpec, FrequencyBand, WindowSpec};

#[derive(Parser, Debug)]
#[command(name = "elecphys")]
#[command(version)]
#[command(about = "Electrophysiology signal conditioning, spectral analysis and band power")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Worker threads (default: available parallelism)
    #[arg(short = 'j', long, global = true)]
    pub workers: Option<usize>,

    /// Stop scheduling files after the first failure
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Write a JSON summary of the run to this path
    #[arg(long, global = true)]
    pub summary: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Input file or folder of `.npz` records and the output folder
#[derive(Args, Debug, Clone)]
pub struct FolderArgs {
    /// Input file or folder
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output folder
    #[arg(short, long, default_value = "output_npz")]
    pub output: PathBuf,
}

/// STFT window settings
#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Window size in seconds
    #[arg(short = 'w', long, default_value_t = 1.0)]
    pub window_size: f64,

    /// Overlap in seconds
    #[arg(long, default_value_t = 0.5)]
    pub overlap: f64,

    /// Window function, e.g. hann, hamming, blackman, "kaiser 8.6"
    #[arg(long, default_value = "hann")]
    pub window_type: WindowFunction,
}

impl WindowArgs {
    pub fn spec(&self) -> crate::Result<WindowSpec> {
        WindowSpec::new(self.window_size, self.overlap, self.window_type)
    }
}

/// Butterworth design on the command line
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// lpf, hpf or bpf
    #[arg(short = 't', long)]
    pub filter_type: String,

    /// Cutoff frequency in Hz (two comma-separated values for bpf)
    #[arg(short = 'c', long, value_delimiter = ',', required = true)]
    pub cutoff: Vec<f64>,

    /// Filter order
    #[arg(long, default_value_t = 4)]
    pub order: usize,
}

impl FilterArgs {
    pub fn spec(&self) -> crate::Result<FilterSpec> {
        FilterSpec::from_parts(&self.filter_type, self.order, &self.cutoff, 0.0)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert MATLAB v5 or v7.3 records (`data`, `fs`) to NPZ, with an optional notch
    ConvertMat {
        /// MAT file or folder of MAT files
        #[arg(short, long)]
        input: PathBuf,

        /// Output folder
        #[arg(short, long, default_value = "output_npz")]
        output: PathBuf,

        /// Notch frequency in Hz (0 disables the notch)
        #[arg(short, long, default_value_t = 50.0)]
        notch_freq: f64,

        /// Notch quality factor
        #[arg(long, default_value_t = 30.0)]
        quality: f64,
    },

    /// Remove line noise with a zero-phase notch filter
    Notch {
        #[command(flatten)]
        io: FolderArgs,

        /// Notch frequency in Hz
        #[arg(short, long, default_value_t = 50.0)]
        freq: f64,

        /// Quality factor (`freq / bandwidth`)
        #[arg(long, default_value_t = 30.0)]
        quality: f64,
    },

    /// Subtract a reference channel or the common average
    Rereference {
        #[command(flatten)]
        io: FolderArgs,

        /// Reference channel (0-based); common average when omitted
        #[arg(short, long)]
        reference_channel: Option<usize>,

        /// Channels left out of the common average (comma-separated)
        #[arg(long, value_delimiter = ',')]
        ignore_channels: Vec<usize>,
    },

    /// Min-max normalize each channel
    Normalize {
        #[command(flatten)]
        io: FolderArgs,

        /// Target minimum
        #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
        low: f64,

        /// Target maximum
        #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
        high: f64,
    },

    /// Z-score normalize each channel
    Zscore {
        #[command(flatten)]
        io: FolderArgs,
    },

    /// Short-time Fourier transform; writes `f`, `t`, `Zxx`
    Stft {
        #[command(flatten)]
        io: FolderArgs,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Full-record DFT; writes `f`, `t`, `Zxx` with a single frame
    Dft {
        #[command(flatten)]
        io: FolderArgs,
    },

    /// Zero-phase Butterworth filtering
    Filter {
        #[command(flatten)]
        io: FolderArgs,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Frequency response of a filter design, written as JSON
    FilterResponse {
        #[command(flatten)]
        filter: FilterArgs,

        /// Sampling rate in Hz
        #[arg(long)]
        fs: f64,

        /// Number of grid points between 0 and Nyquist
        #[arg(short = 'n', long, default_value_t = 512)]
        points: usize,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Band power over time, exported as CSV
    BandPower {
        #[command(flatten)]
        io: FolderArgs,

        /// Inputs are STFT containers (`f`, `t`, `Zxx`) instead of records
        #[arg(long)]
        from_stft: bool,

        #[command(flatten)]
        window: WindowArgs,

        /// Bands as `label:low-high` or `low-high` (comma-separated)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_band)]
        bands: Vec<FrequencyBand>,

        /// Band preset used when no bands are given. Every band must start
        /// below the record's Nyquist frequency (high-gamma needs fs > 300 Hz)
        #[arg(long, default_value = "canonical")]
        preset: BandPreset,

        /// Channels to include (comma-separated, 0-based)
        #[arg(long, value_delimiter = ',')]
        channels: Option<Vec<usize>>,

        /// Channels to drop after the include list
        #[arg(long, value_delimiter = ',')]
        ignore_channels: Vec<usize>,

        /// avg (average-of-channels) or all (all-channels)
        #[arg(short, long, default_value = "avg")]
        mode: AggregationMode,

        /// First frame time to keep (s)
        #[arg(long)]
        t_min: Option<f64>,

        /// Last frame time to keep (s)
        #[arg(long)]
        t_max: Option<f64>,
    },

    /// Full configured pipeline: notch, referencing, normalization, filter,
    /// STFT and band power
    Run {
        #[command(flatten)]
        io: FolderArgs,

        /// Pipeline configuration JSON (default: user config dir, else built-in)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the effective configuration as JSON and exit
        #[arg(long)]
        print_config: bool,
    },
}

/// Parse `label:low-high` or `low-high` into a band
pub fn parse_band(s: &str) -> Result<FrequencyBand, String> {
    let (label, range) = match s.split_once(':') {
        Some((label, range)) => (Some(label.trim()), range),
        None => (None, s),
    };
    let (low, high) = range
        .split_once('-')
        .ok_or_else(|| format!("band '{}' must look like label:low-high", s))?;
    let low: f64 = low.trim().parse().map_err(|_| format!("invalid low edge in '{}'", s))?;
    let high: f64 = high.trim().parse().map_err(|_| format!("invalid high edge in '{}'", s))?;
    let band = match label {
        Some(label) if !label.is_empty() => FrequencyBand::new(label, low, high),
        _ => FrequencyBand::unlabeled(low, high),
    };
    band.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_band() {
        let band = parse_band("alpha:8-13").unwrap();
        assert_eq!((band.label.as_str(), band.low, band.high), ("alpha", 8.0, 13.0));
        assert_eq!(parse_band("4-8").unwrap().label, "4-8Hz");
        assert!(parse_band("alpha").is_err());
        assert!(parse_band("x:13-8").is_err());
    }

    #[test]
    fn test_band_power_args() {
        let cli = Cli::try_parse_from([
            "elecphys",
            "band-power",
            "-i",
            "in",
            "--bands",
            "alpha:8-13,beta:13-30",
            "--channels",
            "0,2",
            "--mode",
            "all",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::BandPower {
                bands,
                channels,
                mode,
                window,
                ..
            } => {
                assert_eq!(bands.len(), 2);
                assert_eq!(channels, Some(vec![0, 2]));
                assert_eq!(mode, AggregationMode::AllChannels);
                assert_eq!(window.window_type, WindowFunction::Hann);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_filter_args() {
        let cli = Cli::try_parse_from([
            "elecphys", "filter", "-i", "in", "-t", "bpf", "-c", "1,40", "--order", "2",
        ])
        .unwrap();
        match cli.command {
            Command::Filter { filter, .. } => {
                assert_eq!(filter.spec().unwrap(), FilterSpec::bandpass(2, 1.0, 40.0).unwrap());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
