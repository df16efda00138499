// src/core/pipeline.rs
//
// One record end-to-end: conditioning, optional Butterworth filtering,
// STFT and band-power extraction.

use super::analysis::{butterworth_filter, stft, BandPowerAggregator, Preprocessor};
use super::params::{FilterSpec, WindowSpec};
use super::record::{BandPowerSeries, SpectralFrame, TimeSeriesRecord};
use crate::error::Result;

/// Products of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub conditioned: TimeSeriesRecord,
    pub spectral: SpectralFrame,
    pub band_power: Vec<BandPowerSeries>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    preprocessor: Preprocessor,
    filter: Option<FilterSpec>,
    window: WindowSpec,
    aggregator: BandPowerAggregator,
}

impl Pipeline {
    pub fn new(
        preprocessor: Preprocessor,
        filter: Option<FilterSpec>,
        window: WindowSpec,
        aggregator: BandPowerAggregator,
    ) -> Self {
        Self {
            preprocessor,
            filter,
            window,
            aggregator,
        }
    }

    pub fn window(&self) -> &WindowSpec {
        &self.window
    }

    /// Run every stage on `record`. The input is left untouched.
    pub fn process(&self, record: &TimeSeriesRecord) -> Result<PipelineOutput> {
        self.aggregator.check_range(record.nyquist())?;
        let mut conditioned = self.preprocessor.apply(record)?;
        if let Some(spec) = &self.filter {
            conditioned = butterworth_filter(&conditioned, spec)?;
        }
        let spectral = stft(&conditioned, &self.window)?;
        let band_power = self.aggregator.compute(&spectral)?;
        log::debug!(
            "Pipeline produced {} frame(s) and {} band-power series",
            spectral.frame_count(),
            band_power.len()
        );
        Ok(PipelineOutput {
            conditioned,
            spectral,
            band_power,
        })
    }
}
