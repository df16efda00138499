// src/core/analysis/preprocess.rs
//
// Record-to-record conditioning: notch filtering, re-referencing and
// per-channel normalization. Every operation returns a new record.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::dsp::{stats, SosFilter};
use crate::core::params::FilterSpec;
use crate::core::record::TimeSeriesRecord;
use crate::error::{ElecPhysError, Result};

/// Reference signal selection.
///
/// With `channel` set, that channel's samples are the reference. Otherwise
/// the reference is the mean over all channels not in `ignore_channels`.
/// Ignored channels are still re-referenced; they only stay out of the mean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    #[serde(default)]
    pub channel: Option<usize>,
    #[serde(default)]
    pub ignore_channels: Vec<usize>,
}

impl ReferenceSpec {
    pub fn common_average() -> Self {
        Self::default()
    }

    pub fn to_channel(channel: usize) -> Self {
        Self {
            channel: Some(channel),
            ignore_channels: Vec::new(),
        }
    }

    pub fn ignoring(mut self, channels: Vec<usize>) -> Self {
        self.ignore_channels = channels;
        self
    }
}

/// Per-channel normalization policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Normalization {
    /// Linear rescale so each channel spans `[low, high]`
    MinMax { low: f64, high: f64 },
    /// `(x - mean) / std` per channel
    ZScore,
}

impl Default for Normalization {
    fn default() -> Self {
        Self::MinMax {
            low: -1.0,
            high: 1.0,
        }
    }
}

impl FromStr for Normalization {
    type Err = ElecPhysError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "minmax" | "min-max" | "min_max" => Ok(Self::default()),
            "zscore" | "z-score" | "z_score" => Ok(Self::ZScore),
            other => Err(ElecPhysError::validation(format!(
                "unknown normalization '{}'",
                other
            ))),
        }
    }
}

/// Remove a narrow interference band from every channel with a zero-phase
/// notch filter.
pub fn notch_filter(record: &TimeSeriesRecord, spec: &FilterSpec) -> Result<TimeSeriesRecord> {
    if !matches!(spec, FilterSpec::Notch { .. }) {
        return Err(ElecPhysError::validation(format!(
            "notch filtering needs a notch design, got {}",
            spec.name()
        )));
    }
    let filter = SosFilter::design(spec, record.fs())?;
    let samples = record
        .channels()
        .iter()
        .map(|ch| filter.filtfilt(ch))
        .collect::<Result<Vec<_>>>()?;
    log::debug!("Applied {} to {} channel(s)", spec, samples.len());
    Ok(record.with_samples(samples))
}

/// Subtract a reference signal from every channel.
pub fn re_reference(record: &TimeSeriesRecord, reference: &ReferenceSpec) -> Result<TimeSeriesRecord> {
    let n_ch = record.channel_count();
    for &c in &reference.ignore_channels {
        if c >= n_ch {
            return Err(ElecPhysError::validation(format!(
                "ignored channel {} out of range for a {}-channel record",
                c, n_ch
            )));
        }
    }

    let reference_signal: Vec<f64> = match reference.channel {
        Some(c) => record
            .channel(c)
            .ok_or_else(|| {
                ElecPhysError::validation(format!(
                    "reference channel {} out of range for a {}-channel record",
                    c, n_ch
                ))
            })?
            .to_vec(),
        None => {
            let pool: Vec<&[f64]> = record
                .channels()
                .iter()
                .enumerate()
                .filter(|(idx, _)| !reference.ignore_channels.contains(idx))
                .map(|(_, ch)| ch.as_slice())
                .collect();
            if pool.is_empty() {
                return Err(ElecPhysError::validation(
                    "ignore list removes every channel from the reference average",
                ));
            }
            let mut sum = vec![0.0; record.sample_count()];
            for ch in &pool {
                for (acc, v) in sum.iter_mut().zip(ch.iter()) {
                    *acc += v;
                }
            }
            let count = pool.len() as f64;
            sum.into_iter().map(|v| v / count).collect()
        }
    };

    let samples = record
        .channels()
        .iter()
        .map(|ch| ch.iter().zip(&reference_signal).map(|(x, r)| x - r).collect())
        .collect();
    Ok(record.with_samples(samples))
}

/// Rescale each channel linearly so its minimum maps to `low` and its
/// maximum to `high`.
pub fn normalize_min_max(record: &TimeSeriesRecord, low: f64, high: f64) -> Result<TimeSeriesRecord> {
    if !(low.is_finite() && high.is_finite() && low < high) {
        return Err(ElecPhysError::validation(format!(
            "normalization range needs low < high, got [{}, {}]",
            low, high
        )));
    }
    let samples = record
        .channels()
        .iter()
        .enumerate()
        .map(|(idx, ch)| {
            let (min, max) = stats::min_max(ch);
            let span = max - min;
            if !(span.is_finite() && span > 0.0) {
                return Err(ElecPhysError::validation(format!(
                    "channel {} is constant or non-finite, cannot rescale",
                    idx
                )));
            }
            let scale = (high - low) / span;
            Ok(ch.iter().map(|v| low + (v - min) * scale).collect())
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(record.with_samples(samples))
}

/// Subtract each channel's mean and divide by its standard deviation.
pub fn zscore_normalize(record: &TimeSeriesRecord) -> Result<TimeSeriesRecord> {
    let samples = record
        .channels()
        .iter()
        .enumerate()
        .map(|(idx, ch)| {
            let mean = stats::mean(ch);
            let std = stats::std_dev(ch);
            if !(std.is_finite() && std > 0.0) {
                return Err(ElecPhysError::validation(format!(
                    "channel {} has zero variance, cannot z-score",
                    idx
                )));
            }
            Ok(ch.iter().map(|v| (v - mean) / std).collect())
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(record.with_samples(samples))
}

pub fn normalize(record: &TimeSeriesRecord, policy: &Normalization) -> Result<TimeSeriesRecord> {
    match *policy {
        Normalization::MinMax { low, high } => normalize_min_max(record, low, high),
        Normalization::ZScore => zscore_normalize(record),
    }
}

/// Ordered chain of conditioning steps: notch, then referencing, then
/// normalization. Unset steps are skipped.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    notch: Option<FilterSpec>,
    reference: Option<ReferenceSpec>,
    normalization: Option<Normalization>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notch(mut self, spec: FilterSpec) -> Self {
        self.notch = Some(spec);
        self
    }

    pub fn reference(mut self, reference: ReferenceSpec) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn normalization(mut self, policy: Normalization) -> Self {
        self.normalization = Some(policy);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notch.is_none() && self.reference.is_none() && self.normalization.is_none()
    }

    pub fn apply(&self, record: &TimeSeriesRecord) -> Result<TimeSeriesRecord> {
        let mut current = record.clone();
        if let Some(spec) = &self.notch {
            current = notch_filter(&current, spec)?;
        }
        if let Some(reference) = &self.reference {
            current = re_reference(&current, reference)?;
        }
        if let Some(policy) = &self.normalization {
            current = normalize(&current, policy)?;
        }
        Ok(current)
    }
}
