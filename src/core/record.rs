// src/core/record.rs
//
// In-memory data model shared by every stage: time series records,
// spectral frames and band-power series.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{ElecPhysError, Result};

/// Multi-channel signal with a fixed sampling rate.
///
/// Every channel has the same number of samples. Stages never mutate a
/// record; each transformation yields a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRecord {
    samples: Vec<Vec<f64>>,
    fs: f64,
}

impl TimeSeriesRecord {
    /// Build a record, checking that all channels share one non-zero length
    /// and that the sampling rate is a positive finite number.
    pub fn new(samples: Vec<Vec<f64>>, fs: f64) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(ElecPhysError::format(format!(
                "sampling rate must be a positive finite number, got {}",
                fs
            )));
        }
        if samples.is_empty() {
            return Err(ElecPhysError::format("record has no channels"));
        }
        let len = samples[0].len();
        if len == 0 {
            return Err(ElecPhysError::format("record has no samples"));
        }
        if let Some((idx, ch)) = samples.iter().enumerate().find(|(_, ch)| ch.len() != len) {
            return Err(ElecPhysError::format(format!(
                "channel {} has {} samples, expected {}",
                idx,
                ch.len(),
                len
            )));
        }
        Ok(Self { samples, fs })
    }

    /// Build a record from a row-major `[channels * n_samples]` buffer.
    pub fn from_row_major(flat: &[f64], channels: usize, fs: f64) -> Result<Self> {
        if channels == 0 || flat.len() % channels != 0 {
            return Err(ElecPhysError::format(format!(
                "{} values cannot be split into {} channels",
                flat.len(),
                channels
            )));
        }
        let n = flat.len() / channels;
        let samples = if n == 0 {
            vec![Vec::new(); channels]
        } else {
            flat.chunks(n).map(|c| c.to_vec()).collect()
        };
        Self::new(samples, fs)
    }

    /// Same sampling rate, new samples. Used by stages to emit their output.
    pub(crate) fn with_samples(&self, samples: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(samples.len(), self.samples.len());
        Self { samples, fs: self.fs }
    }

    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn nyquist(&self) -> f64 {
        self.fs / 2.0
    }

    pub fn channel_count(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_count(&self) -> usize {
        self.samples[0].len()
    }

    pub fn duration_secs(&self) -> f64 {
        self.sample_count() as f64 / self.fs
    }

    pub fn channel(&self, idx: usize) -> Option<&[f64]> {
        self.samples.get(idx).map(|c| c.as_slice())
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.samples
    }

    pub fn into_channels(self) -> Vec<Vec<f64>> {
        self.samples
    }

    /// Sample times in seconds (`t / fs`)
    pub fn times(&self) -> Vec<f64> {
        (0..self.sample_count()).map(|i| i as f64 / self.fs).collect()
    }
}

/// Complex spectral representation `magnitude[channel][f][t]`.
///
/// `times` holds frame centers in seconds. A full-record DFT is a frame with
/// a single time marker at the record midpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    frequencies: Vec<f64>,
    times: Vec<f64>,
    values: Vec<Vec<Vec<Complex64>>>,
}

impl SpectralFrame {
    pub fn new(
        frequencies: Vec<f64>,
        times: Vec<f64>,
        values: Vec<Vec<Vec<Complex64>>>,
    ) -> Result<Self> {
        if !is_ascending(&frequencies) {
            return Err(ElecPhysError::format("frequency axis is not ascending"));
        }
        if !is_ascending(&times) {
            return Err(ElecPhysError::format("time axis is not ascending"));
        }
        for (ch, rows) in values.iter().enumerate() {
            if rows.len() != frequencies.len() {
                return Err(ElecPhysError::format(format!(
                    "channel {} has {} frequency rows, expected {}",
                    ch,
                    rows.len(),
                    frequencies.len()
                )));
            }
            if let Some(row) = rows.iter().find(|r| r.len() != times.len()) {
                return Err(ElecPhysError::format(format!(
                    "channel {} has a row of {} frames, expected {}",
                    ch,
                    row.len(),
                    times.len()
                )));
            }
        }
        Ok(Self {
            frequencies,
            times,
            values,
        })
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[Vec<Vec<Complex64>>] {
        &self.values
    }

    pub fn channel_count(&self) -> usize {
        self.values.len()
    }

    pub fn frame_count(&self) -> usize {
        self.times.len()
    }

    pub fn bin_count(&self) -> usize {
        self.frequencies.len()
    }

    /// Bin spacing in Hz (0 when there is a single bin)
    pub fn resolution(&self) -> f64 {
        match self.frequencies.as_slice() {
            [a, b, ..] => b - a,
            _ => 0.0,
        }
    }

    /// `|Z|` for one channel, laid out `[f][t]`
    pub fn magnitude(&self, channel: usize) -> Option<Vec<Vec<f64>>> {
        self.values
            .get(channel)
            .map(|rows| rows.iter().map(|r| r.iter().map(|z| z.norm()).collect()).collect())
    }

    /// `|Z|` in dB (`20 log10`), floored at -300 dB
    pub fn magnitude_db(&self, channel: usize) -> Option<Vec<Vec<f64>>> {
        self.magnitude(channel).map(|rows| {
            rows.into_iter()
                .map(|r| r.into_iter().map(crate::core::dsp::amplitude_to_db).collect())
                .collect()
        })
    }
}

fn is_ascending(axis: &[f64]) -> bool {
    axis.iter().all(|v| v.is_finite()) && axis.windows(2).all(|w| w[0] < w[1])
}

/// Power of one band over time, either channel-averaged or for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPowerSeries {
    pub band_label: String,
    /// `None` for a channel-averaged series
    pub channel: Option<usize>,
    pub times: Vec<f64>,
    pub power: Vec<f64>,
}

impl BandPowerSeries {
    /// Column header used by the tabular export
    pub fn column_name(&self) -> String {
        match self.channel {
            Some(ch) => format!("ch{}_{}", ch, self.band_label),
            None => self.band_label.clone(),
        }
    }

    pub fn mean_power(&self) -> f64 {
        if self.power.is_empty() {
            return 0.0;
        }
        self.power.iter().sum::<f64>() / self.power.len() as f64
    }
}
