// src/core/params.rs
//
// Validated parameter types: filter designs, STFT windows and frequency bands.
// Shape constraints are checked at construction; constraints that depend on
// the sampling rate are checked by `validate_for` when a record is at hand.

use serde::{Deserialize, Serialize};

use super::dsp::WindowFunction;
use crate::error::{ElecPhysError, Result};

/// Filter design request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterSpec {
    /// Second-order notch at `freq` with bandwidth `freq / quality`
    Notch { freq: f64, quality: f64 },
    Lowpass { order: usize, cutoff: f64 },
    Highpass { order: usize, cutoff: f64 },
    Bandpass { order: usize, low: f64, high: f64 },
}

impl FilterSpec {
    pub fn notch(freq: f64, quality: f64) -> Result<Self> {
        check_positive("notch frequency", freq)?;
        check_positive("quality factor", quality)?;
        Ok(Self::Notch { freq, quality })
    }

    pub fn lowpass(order: usize, cutoff: f64) -> Result<Self> {
        check_order(order)?;
        check_positive("cutoff", cutoff)?;
        Ok(Self::Lowpass { order, cutoff })
    }

    pub fn highpass(order: usize, cutoff: f64) -> Result<Self> {
        check_order(order)?;
        check_positive("cutoff", cutoff)?;
        Ok(Self::Highpass { order, cutoff })
    }

    pub fn bandpass(order: usize, low: f64, high: f64) -> Result<Self> {
        check_order(order)?;
        check_positive("low cutoff", low)?;
        check_positive("high cutoff", high)?;
        if low >= high {
            return Err(ElecPhysError::validation(format!(
                "band-pass low cutoff {} Hz must be below high cutoff {} Hz",
                low, high
            )));
        }
        Ok(Self::Bandpass { order, low, high })
    }

    /// Parse the short filter names used on the command line
    /// (`lpf`, `hpf`, `bpf`, `notch`) together with their cutoffs.
    pub fn from_parts(kind: &str, order: usize, cutoffs: &[f64], quality: f64) -> Result<Self> {
        match (kind.to_lowercase().as_str(), cutoffs) {
            ("lpf" | "lowpass", [c]) => Self::lowpass(order, *c),
            ("hpf" | "highpass", [c]) => Self::highpass(order, *c),
            ("bpf" | "bandpass", [lo, hi]) => Self::bandpass(order, *lo, *hi),
            ("notch", [f0]) => Self::notch(*f0, quality),
            (k, c) => Err(ElecPhysError::validation(format!(
                "filter type '{}' does not accept {} cutoff value(s)",
                k,
                c.len()
            ))),
        }
    }

    /// Re-run the construction checks, for specs that were deserialized.
    pub fn check(&self) -> Result<()> {
        match *self {
            Self::Notch { freq, quality } => Self::notch(freq, quality),
            Self::Lowpass { order, cutoff } => Self::lowpass(order, cutoff),
            Self::Highpass { order, cutoff } => Self::highpass(order, cutoff),
            Self::Bandpass { order, low, high } => Self::bandpass(order, low, high),
        }
        .map(|_| ())
    }

    /// Check every cutoff against the Nyquist frequency of `fs`.
    pub fn validate_for(&self, fs: f64) -> Result<()> {
        let nyquist = fs / 2.0;
        let below_nyquist = |name: &str, f: f64| {
            if f < nyquist {
                Ok(())
            } else {
                Err(ElecPhysError::validation(format!(
                    "{} {} Hz must be below the Nyquist frequency {} Hz",
                    name, f, nyquist
                )))
            }
        };
        match *self {
            Self::Notch { freq, .. } => below_nyquist("notch frequency", freq),
            Self::Lowpass { cutoff, .. } | Self::Highpass { cutoff, .. } => {
                below_nyquist("cutoff", cutoff)
            }
            Self::Bandpass { high, .. } => below_nyquist("high cutoff", high),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Notch { .. } => "notch",
            Self::Lowpass { .. } => "lowpass",
            Self::Highpass { .. } => "highpass",
            Self::Bandpass { .. } => "bandpass",
        }
    }
}

impl std::fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notch { freq, quality } => write!(f, "notch {} Hz (Q={})", freq, quality),
            Self::Lowpass { order, cutoff } => write!(f, "lowpass order {} at {} Hz", order, cutoff),
            Self::Highpass { order, cutoff } => {
                write!(f, "highpass order {} at {} Hz", order, cutoff)
            }
            Self::Bandpass { order, low, high } => {
                write!(f, "bandpass order {} {}-{} Hz", order, low, high)
            }
        }
    }
}

fn check_positive(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ElecPhysError::validation(format!(
            "{} must be a positive finite number, got {}",
            name, v
        )))
    }
}

fn check_order(order: usize) -> Result<()> {
    if order == 0 {
        return Err(ElecPhysError::validation("filter order must be at least 1"));
    }
    Ok(())
}

/// STFT window description in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub size_seconds: f64,
    pub overlap_seconds: f64,
    #[serde(default)]
    pub window_function: WindowFunction,
}

impl WindowSpec {
    pub fn new(size_seconds: f64, overlap_seconds: f64, window_function: WindowFunction) -> Result<Self> {
        if !(size_seconds.is_finite() && size_seconds > 0.0) {
            return Err(ElecPhysError::validation(format!(
                "window size must be positive, got {} s",
                size_seconds
            )));
        }
        if !(overlap_seconds.is_finite() && overlap_seconds >= 0.0 && overlap_seconds < size_seconds) {
            return Err(ElecPhysError::validation(format!(
                "overlap must satisfy 0 <= overlap < size, got {} s with size {} s",
                overlap_seconds, size_seconds
            )));
        }
        Ok(Self {
            size_seconds,
            overlap_seconds,
            window_function,
        })
    }

    /// Resolve `(window_samples, step_samples)` for a sampling rate.
    ///
    /// Both durations are rounded to the nearest sample (half away from zero).
    pub fn to_samples(&self, fs: f64) -> Result<(usize, usize)> {
        let window = (self.size_seconds * fs).round();
        let overlap = (self.overlap_seconds * fs).round();
        if window < 1.0 {
            return Err(ElecPhysError::validation(format!(
                "window of {} s is shorter than one sample at {} Hz",
                self.size_seconds, fs
            )));
        }
        if overlap >= window {
            return Err(ElecPhysError::validation(format!(
                "overlap rounds to {} samples, not below the {}-sample window",
                overlap, window
            )));
        }
        let window = window as usize;
        let step = window - overlap as usize;
        Ok((window, step))
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            size_seconds: 1.0,
            overlap_seconds: 0.5,
            window_function: WindowFunction::Hann,
        }
    }
}

/// Frequency interval `[low, high)` in Hz with a display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub label: String,
    pub low: f64,
    pub high: f64,
}

impl FrequencyBand {
    pub fn new(label: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low >= 0.0 && low < high) {
            return Err(ElecPhysError::validation(format!(
                "frequency band needs 0 <= low < high, got [{}, {})",
                low, high
            )));
        }
        Ok(Self {
            label: label.into(),
            low,
            high,
        })
    }

    /// Band labelled by its edges, e.g. `"8-13Hz"`
    pub fn unlabeled(low: f64, high: f64) -> Result<Self> {
        Self::new(format!("{}-{}Hz", low, high), low, high)
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.low && freq < self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Channel allow-list plus ignore-list, resolved against a channel count.
///
/// `include = None` means every channel. The ignore-list is applied after
/// the allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSelection {
    #[serde(default)]
    pub include: Option<Vec<usize>>,
    #[serde(default)]
    pub ignore: Vec<usize>,
}

impl ChannelSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(channels: Vec<usize>) -> Self {
        Self {
            include: Some(channels),
            ignore: Vec::new(),
        }
    }

    pub fn ignoring(mut self, channels: Vec<usize>) -> Self {
        self.ignore = channels;
        self
    }

    /// Sorted, de-duplicated channel indices. Out-of-range indices and an
    /// empty result are validation errors.
    pub fn resolve(&self, channel_count: usize) -> Result<Vec<usize>> {
        let check = |idx: usize| {
            if idx < channel_count {
                Ok(idx)
            } else {
                Err(ElecPhysError::validation(format!(
                    "channel {} out of range for a {}-channel record",
                    idx, channel_count
                )))
            }
        };

        let mut selected: Vec<usize> = match &self.include {
            Some(list) => list.iter().map(|&c| check(c)).collect::<Result<_>>()?,
            None => (0..channel_count).collect(),
        };
        for &c in &self.ignore {
            check(c)?;
        }
        selected.sort_unstable();
        selected.dedup();
        selected.retain(|c| !self.ignore.contains(c));

        if selected.is_empty() {
            return Err(ElecPhysError::validation("channel selection is empty"));
        }
        Ok(selected)
    }
}
