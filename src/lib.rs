//! ElecPhys - Electrophysiology signal conditioning and spectral analysis
//!
//! Converts multi-channel recordings into a canonical array format, conditions
//! them (line-noise notch, re-referencing, normalization), computes STFT and
//! full-record DFT representations, applies zero-phase Butterworth filters and
//! extracts band-power trajectories.
//!
//! ## Module Structure
//!
//! - `core` - data model, DSP primitives and the analysis stages
//! - `io` - NPZ / MAT records, spectral containers, CSV and JSON exports
//! - `batch` - folder-level driver on a bounded worker pool
//! - `config` - pipeline settings and band presets
//! - `cli` - command-line interface
//! - `error` - library error kinds
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use elecphys::core::analysis::{notch_filter, stft, BandPowerAggregator};
//! use elecphys::config::BandPreset;
//! use elecphys::{FilterSpec, WindowSpec};
//!
//! let record = elecphys::io::read_record(path)?;
//! let clean = notch_filter(&record, &FilterSpec::notch(50.0, 30.0)?)?;
//! let frame = stft(&clean, &WindowSpec::default())?;
//! let series = BandPowerAggregator::new(BandPreset::Canonical.bands()).compute(&frame)?;
//! ```
//!
//! ## Conventions
//!
//! | Quantity          | Convention                                          |
//! |-------------------|-----------------------------------------------------|
//! | Window / overlap  | `round(seconds * fs)` samples, half away from zero  |
//! | STFT time markers | Frame centers                                       |
//! | STFT scaling      | Divided by the window sum                           |
//! | DFT scaling       | Divided by the record length                        |
//! | Channel indices   | 0-based                                             |
//! | Band membership   | `low <= f < high`                                   |

// Core analysis functionality
pub mod core;

// File containers and exports
pub mod io;

// Batch driver
pub mod batch;

// Configuration and presets
pub mod config;

// Command-line interface
pub mod cli;

pub mod error;

pub use config::{BandPreset, PipelineBuilder, PipelineConfig};
pub use crate::core::{
    AggregationMode, BandPowerAggregator, BandPowerSeries, ChannelSelection, FilterSpec,
    FrequencyBand, Normalization, Preprocessor, ReferenceSpec, SpectralFrame, TimeSeriesRecord,
    WindowSpec,
};
pub use error::{ElecPhysError, Result};
