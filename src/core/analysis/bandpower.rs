// src/core/analysis/bandpower.rs
//
// Integrates squared spectral magnitude over frequency bands into
// power-over-time series, per channel or channel-averaged.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::spectral::stft;
use crate::core::params::{ChannelSelection, FrequencyBand, WindowSpec};
use crate::core::record::{BandPowerSeries, SpectralFrame, TimeSeriesRecord};
use crate::error::{ElecPhysError, Result};

/// How selected channels are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMode {
    /// One series per band, averaged over the selected channels
    #[default]
    AverageOfChannels,
    /// One series per band and selected channel
    AllChannels,
}

impl FromStr for AggregationMode {
    type Err = ElecPhysError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "avg" | "average" | "average-of-channels" | "average_of_channels" => {
                Ok(Self::AverageOfChannels)
            }
            "all" | "all-channels" | "all_channels" => Ok(Self::AllChannels),
            other => Err(ElecPhysError::validation(format!(
                "unknown aggregation mode '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AverageOfChannels => write!(f, "average-of-channels"),
            Self::AllChannels => write!(f, "all-channels"),
        }
    }
}

/// Band-power extraction settings.
///
/// Defaults: every channel, channel-averaged, full time range.
#[derive(Debug, Clone)]
pub struct BandPowerAggregator {
    bands: Vec<FrequencyBand>,
    channels: ChannelSelection,
    mode: AggregationMode,
    t_min: Option<f64>,
    t_max: Option<f64>,
}

impl BandPowerAggregator {
    pub fn new(bands: Vec<FrequencyBand>) -> Self {
        Self {
            bands,
            channels: ChannelSelection::all(),
            mode: AggregationMode::default(),
            t_min: None,
            t_max: None,
        }
    }

    pub fn channels(mut self, channels: ChannelSelection) -> Self {
        self.channels = channels;
        self
    }

    pub fn mode(mut self, mode: AggregationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep only frames whose time marker lies in `[t_min, t_max]`
    pub fn time_range(mut self, t_min: Option<f64>, t_max: Option<f64>) -> Self {
        self.t_min = t_min;
        self.t_max = t_max;
        self
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// Reject bands that start above `max_freq`, naming every offending band.
    pub fn check_range(&self, max_freq: f64) -> Result<()> {
        let above: Vec<String> = self
            .bands
            .iter()
            .filter(|b| b.low > max_freq)
            .map(|b| format!("'{}' ({}-{} Hz)", b.label, b.low, b.high))
            .collect();
        if above.is_empty() {
            return Ok(());
        }
        Err(ElecPhysError::validation(format!(
            "band(s) {} start above the highest analysed frequency of {} Hz; \
             choose bands or a preset below the Nyquist frequency",
            above.join(", "),
            max_freq
        )))
    }

    /// Derive an STFT from `record` and extract band power from it.
    pub fn compute_from_record(
        &self,
        record: &TimeSeriesRecord,
        window: &WindowSpec,
    ) -> Result<Vec<BandPowerSeries>> {
        self.check_range(record.nyquist())?;
        let frame = stft(record, window)?;
        self.compute(&frame)
    }

    /// Band power for every configured band, band-major: all series of the
    /// first band come first.
    pub fn compute(&self, frame: &SpectralFrame) -> Result<Vec<BandPowerSeries>> {
        if self.bands.is_empty() {
            return Err(ElecPhysError::validation("no frequency bands requested"));
        }
        if let Some(&top) = frame.frequencies().last() {
            self.check_range(top)?;
        }
        let frames = self.frame_indices(frame.times())?;
        let channels = self.channels.resolve(frame.channel_count())?;
        let times: Vec<f64> = frames.iter().map(|&t| frame.times()[t]).collect();

        let mut output = Vec::new();
        for band in &self.bands {
            let bins: Vec<usize> = frame
                .frequencies()
                .iter()
                .enumerate()
                .filter(|(_, f)| band.contains(**f))
                .map(|(k, _)| k)
                .collect();
            if bins.is_empty() {
                return Err(ElecPhysError::validation(format!(
                    "band '{}' [{}, {}) Hz contains no spectral bins",
                    band.label, band.low, band.high
                )));
            }

            let per_channel: Vec<Vec<f64>> = channels
                .iter()
                .map(|&ch| band_power(frame, ch, &bins, &frames))
                .collect();

            match self.mode {
                AggregationMode::AverageOfChannels => {
                    let count = per_channel.len() as f64;
                    let power = (0..frames.len())
                        .map(|t| per_channel.iter().map(|p| p[t]).sum::<f64>() / count)
                        .collect();
                    output.push(BandPowerSeries {
                        band_label: band.label.clone(),
                        channel: None,
                        times: times.clone(),
                        power,
                    });
                }
                AggregationMode::AllChannels => {
                    for (&ch, power) in channels.iter().zip(per_channel) {
                        output.push(BandPowerSeries {
                            band_label: band.label.clone(),
                            channel: Some(ch),
                            times: times.clone(),
                            power,
                        });
                    }
                }
            }
            log::debug!(
                "Band '{}': {} bin(s) over {} channel(s), {} frame(s)",
                band.label,
                bins.len(),
                channels.len(),
                frames.len()
            );
        }
        Ok(output)
    }

    fn frame_indices(&self, times: &[f64]) -> Result<Vec<usize>> {
        if let (Some(lo), Some(hi)) = (self.t_min, self.t_max) {
            if lo > hi {
                return Err(ElecPhysError::validation(format!(
                    "t_min ({}) is after t_max ({})",
                    lo, hi
                )));
            }
        }
        let lo = self.t_min.unwrap_or(f64::NEG_INFINITY);
        let hi = self.t_max.unwrap_or(f64::INFINITY);
        let indices: Vec<usize> = times
            .iter()
            .enumerate()
            .filter(|(_, t)| **t >= lo && **t <= hi)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Err(ElecPhysError::validation(format!(
                "no frames between {} s and {} s",
                lo, hi
            )));
        }
        Ok(indices)
    }
}

/// Sum of `|Z|^2` over `bins` for each retained frame
fn band_power(frame: &SpectralFrame, channel: usize, bins: &[usize], frames: &[usize]) -> Vec<f64> {
    let rows = &frame.values()[channel];
    frames
        .iter()
        .map(|&t| bins.iter().map(|&k| rows[k][t].norm_sqr()).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dsp::WindowFunction;
    use std::f64::consts::PI;

    fn two_tone_record() -> TimeSeriesRecord {
        let fs = 100.0;
        let n = 500;
        let ch0 = (0..n)
            .map(|i| (2.0 * PI * 10.0 * i as f64 / fs).sin())
            .collect();
        let ch1 = (0..n)
            .map(|i| 3.0 * (2.0 * PI * 20.0 * i as f64 / fs).sin())
            .collect();
        TimeSeriesRecord::new(vec![ch0, ch1], fs).unwrap()
    }

    fn window() -> WindowSpec {
        WindowSpec::new(1.0, 0.5, WindowFunction::Hann).unwrap()
    }

    #[test]
    fn test_aggregation_mode_parse() {
        assert_eq!("avg".parse::<AggregationMode>().unwrap(), AggregationMode::AverageOfChannels);
        assert_eq!("all-channels".parse::<AggregationMode>().unwrap(), AggregationMode::AllChannels);
        assert!("median".parse::<AggregationMode>().is_err());
    }

    #[test]
    fn test_superset_band_has_more_power() {
        let record = two_tone_record();
        let bands = vec![
            FrequencyBand::new("narrow", 9.0, 11.0).unwrap(),
            FrequencyBand::new("wide", 5.0, 25.0).unwrap(),
            FrequencyBand::new("full", 0.0, 50.0).unwrap(),
        ];
        let series = BandPowerAggregator::new(bands)
            .compute_from_record(&record, &window())
            .unwrap();
        assert_eq!(series.len(), 3);
        for t in 0..series[0].power.len() {
            assert!(series[1].power[t] >= series[0].power[t]);
            assert!(series[2].power[t] >= series[1].power[t]);
        }
    }

    #[test]
    fn test_all_channels_mode() {
        let record = two_tone_record();
        let bands = vec![FrequencyBand::new("alpha", 8.0, 13.0).unwrap()];
        let series = BandPowerAggregator::new(bands)
            .mode(AggregationMode::AllChannels)
            .compute_from_record(&record, &window())
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].channel, Some(0));
        assert_eq!(series[1].column_name(), "ch1_alpha");
        assert!(series[0].mean_power() > 100.0 * series[1].mean_power());
    }

    #[test]
    fn test_average_mode_is_channel_mean() {
        let record = two_tone_record();
        let frame = stft(&record, &window()).unwrap();
        let bands = vec![FrequencyBand::new("beta", 13.0, 30.0).unwrap()];
        let each = BandPowerAggregator::new(bands.clone())
            .mode(AggregationMode::AllChannels)
            .compute(&frame)
            .unwrap();
        let avg = BandPowerAggregator::new(bands).compute(&frame).unwrap();
        assert_eq!(avg.len(), 1);
        assert_eq!(avg[0].channel, None);
        for t in 0..avg[0].power.len() {
            let expected = (each[0].power[t] + each[1].power[t]) / 2.0;
            assert!((avg[0].power[t] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_selection_and_cropping() {
        let record = two_tone_record();
        let bands = vec![FrequencyBand::new("beta", 13.0, 30.0).unwrap()];
        let series = BandPowerAggregator::new(bands.clone())
            .channels(ChannelSelection::only(vec![0, 1]).ignoring(vec![0]))
            .time_range(Some(1.0), Some(3.0))
            .compute_from_record(&record, &window())
            .unwrap();
        assert_eq!(series[0].times, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        // only channel 1 remains: Hann puts 1.5 on the 20 Hz bin and 0.75 on each neighbour
        assert!((series[0].power[0] - 3.375).abs() < 1e-9);

        let err = BandPowerAggregator::new(bands)
            .time_range(Some(10.0), None)
            .compute_from_record(&record, &window())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_band_without_bins() {
        let record = two_tone_record();
        let bands = vec![FrequencyBand::new("tiny", 10.2, 10.4).unwrap()];
        let err = BandPowerAggregator::new(bands)
            .compute_from_record(&record, &window())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_bands_above_nyquist_are_named() {
        let samples = vec![(0..2500).map(|i| (i as f64 * 0.3).sin()).collect()];
        let record = TimeSeriesRecord::new(samples, 250.0).unwrap();
        let bands = vec![
            FrequencyBand::new("low-gamma", 30.0, 60.0).unwrap(),
            FrequencyBand::new("ripple", 150.0, 250.0).unwrap(),
        ];
        let aggregator = BandPowerAggregator::new(bands);
        let err = aggregator.compute_from_record(&record, &window()).unwrap_err();
        assert!(err.is_validation());
        let msg = err.to_string();
        assert!(msg.contains("'ripple'"), "{}", msg);
        assert!(!msg.contains("low-gamma"), "{}", msg);

        let frame = stft(&record, &window()).unwrap();
        assert!(aggregator.compute(&frame).unwrap_err().to_string().contains("'ripple'"));
    }
}
