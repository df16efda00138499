// src/config/pipeline.rs
//
// Serializable pipeline settings and a builder for custom setups.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::presets::BandPreset;
use crate::batch::{BatchOptions, FailurePolicy};
use crate::core::analysis::{AggregationMode, BandPowerAggregator, Normalization, Preprocessor, ReferenceSpec};
use crate::core::params::{ChannelSelection, FilterSpec, FrequencyBand, WindowSpec};
use crate::core::pipeline::Pipeline;
use crate::error::{ElecPhysError, Result};
use crate::io::write_atomic;

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Line-noise notch applied first (`None` disables it)
    pub notch: Option<FilterSpec>,
    pub reference: Option<ReferenceSpec>,
    pub normalization: Option<Normalization>,
    /// Butterworth low/high/band-pass applied after conditioning
    pub filter: Option<FilterSpec>,
    pub window: WindowSpec,
    pub bands: Vec<FrequencyBand>,
    pub channels: ChannelSelection,
    pub mode: AggregationMode,
    pub t_min: Option<f64>,
    pub t_max: Option<f64>,
    /// Also write the STFT of each record
    pub save_spectral: bool,
    /// Worker threads (`None` = available parallelism)
    pub workers: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            notch: Some(FilterSpec::Notch {
                freq: 50.0,
                quality: 30.0,
            }),
            reference: None,
            normalization: None,
            filter: None,
            window: WindowSpec::default(),
            bands: BandPreset::Canonical.bands(),
            channels: ChannelSelection::all(),
            mode: AggregationMode::AverageOfChannels,
            t_min: None,
            t_max: None,
            save_spectral: false,
            workers: None,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        write_atomic(path, |file| {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
            Ok(())
        })
    }

    /// `<config dir>/elecphys/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("elecphys").join("config.json"))
    }

    /// Explicit path if given, else the default path if it exists, else
    /// built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_json_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::info!("Using configuration {}", path.display());
                Self::from_json_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Re-check invariants that deserialization cannot enforce.
    pub fn validate(&self) -> Result<()> {
        WindowSpec::new(
            self.window.size_seconds,
            self.window.overlap_seconds,
            self.window.window_function,
        )?;
        if self.bands.is_empty() {
            return Err(ElecPhysError::validation("configuration lists no frequency bands"));
        }
        for band in &self.bands {
            FrequencyBand::new(band.label.clone(), band.low, band.high)?;
        }
        for spec in self.notch.iter().chain(self.filter.iter()) {
            spec.check()?;
        }
        if let Some(spec) = &self.notch {
            if !matches!(spec, FilterSpec::Notch { .. }) {
                return Err(ElecPhysError::validation(format!(
                    "'notch' must be a notch design, got {}",
                    spec.name()
                )));
            }
        }
        if let Some(FilterSpec::Notch { .. }) = &self.filter {
            return Err(ElecPhysError::validation(
                "'filter' must be a lowpass, highpass or bandpass design",
            ));
        }
        if self.workers == Some(0) {
            return Err(ElecPhysError::validation("worker count must be at least 1"));
        }
        Ok(())
    }

    pub fn preprocessor(&self) -> Preprocessor {
        let mut pre = Preprocessor::new();
        if let Some(spec) = &self.notch {
            pre = pre.notch(*spec);
        }
        if let Some(reference) = &self.reference {
            pre = pre.reference(reference.clone());
        }
        if let Some(policy) = self.normalization {
            pre = pre.normalization(policy);
        }
        pre
    }

    pub fn aggregator(&self) -> BandPowerAggregator {
        BandPowerAggregator::new(self.bands.clone())
            .channels(self.channels.clone())
            .mode(self.mode)
            .time_range(self.t_min, self.t_max)
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        self.validate()?;
        Ok(Pipeline::new(
            self.preprocessor(),
            self.filter,
            self.window,
            self.aggregator(),
        ))
    }

    pub fn batch_options(&self, show_progress: bool) -> BatchOptions {
        BatchOptions {
            workers: self.workers,
            policy: self.failure_policy,
            show_progress,
        }
    }
}

/// Builder for custom configurations
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn notch(mut self, spec: Option<FilterSpec>) -> Self {
        self.config.notch = spec;
        self
    }

    pub fn reference(mut self, reference: Option<ReferenceSpec>) -> Self {
        self.config.reference = reference;
        self
    }

    pub fn normalization(mut self, policy: Option<Normalization>) -> Self {
        self.config.normalization = policy;
        self
    }

    pub fn filter(mut self, spec: Option<FilterSpec>) -> Self {
        self.config.filter = spec;
        self
    }

    pub fn window(mut self, window: WindowSpec) -> Self {
        self.config.window = window;
        self
    }

    pub fn bands(mut self, bands: Vec<FrequencyBand>) -> Self {
        self.config.bands = bands;
        self
    }

    pub fn preset(mut self, preset: BandPreset) -> Self {
        self.config.bands = preset.bands();
        self
    }

    pub fn channels(mut self, channels: ChannelSelection) -> Self {
        self.config.channels = channels;
        self
    }

    pub fn mode(mut self, mode: AggregationMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn time_range(mut self, t_min: Option<f64>, t_max: Option<f64>) -> Self {
        self.config.t_min = t_min;
        self.config.t_max = t_max;
        self
    }

    pub fn save_spectral(mut self, save: bool) -> Self {
        self.config.save_spectral = save;
        self
    }

    pub fn workers(mut self, workers: Option<usize>) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
