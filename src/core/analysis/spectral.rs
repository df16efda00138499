// src/core/analysis/spectral.rs
//
// Record-to-spectrum transforms (STFT, full-record DFT), zero-phase
// Butterworth filtering and the spectrum helpers built on them.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::core::dsp::{self, stats, FftProcessor, FrequencyResponse, SosFilter, WindowFunction};
use crate::core::params::{ChannelSelection, FilterSpec, WindowSpec};
use crate::core::record::{SpectralFrame, TimeSeriesRecord};
use crate::error::{ElecPhysError, Result};

/// Default number of points for filter response grids
pub const DEFAULT_RESPONSE_POINTS: usize = 512;

/// Number of STFT frames for `n` samples: `floor((n - window) / step) + 1`.
pub fn stft_frame_count(n: usize, window: usize, step: usize) -> Result<usize> {
    if window == 0 || step == 0 {
        return Err(ElecPhysError::validation(format!(
            "window ({}) and step ({}) must both be positive",
            window, step
        )));
    }
    if window > n {
        return Err(ElecPhysError::validation(format!(
            "window of {} samples is longer than the {}-sample record",
            window, n
        )));
    }
    Ok((n - window) / step + 1)
}

/// Short-time Fourier transform of every channel.
///
/// Frames start at multiples of the step and are time-stamped at their
/// centers. Each frame spectrum is divided by the window sum.
pub fn stft(record: &TimeSeriesRecord, window: &WindowSpec) -> Result<SpectralFrame> {
    let fs = record.fs();
    let (window_len, step) = window.to_samples(fs)?;
    let n_frames = stft_frame_count(record.sample_count(), window_len, step)?;
    log::debug!(
        "STFT: window={} samples, step={} samples, {} frame(s) at {} Hz",
        window_len,
        step,
        n_frames,
        fs
    );

    let frequencies = FftProcessor::new(window_len, window.window_function).frequencies(fs);
    let times = (0..n_frames)
        .map(|i| (i * step) as f64 / fs + window_len as f64 / (2.0 * fs))
        .collect();

    let values = record
        .channels()
        .par_iter()
        .map(|ch| -> Result<Vec<Vec<Complex64>>> {
            let mut fft = FftProcessor::new(window_len, window.window_function);
            let mut rows = vec![Vec::with_capacity(n_frames); fft.bin_count()];
            for i in 0..n_frames {
                let start = i * step;
                let spectrum = fft.scaled_spectrum(&ch[start..start + window_len])?;
                for (row, z) in rows.iter_mut().zip(spectrum) {
                    row.push(z);
                }
            }
            Ok(rows)
        })
        .collect::<Result<Vec<_>>>()?;

    SpectralFrame::new(frequencies, times, values)
}

/// One-sided spectrum of each full channel, divided by the record length.
///
/// The result is a frame with a single time marker at the record midpoint.
pub fn dft(record: &TimeSeriesRecord) -> Result<SpectralFrame> {
    let n = record.sample_count();
    if n == 0 {
        return Err(ElecPhysError::validation("cannot transform an empty record"));
    }
    let fs = record.fs();
    let mut fft = FftProcessor::new(n, WindowFunction::Rectangular);
    let frequencies = fft.frequencies(fs);
    log::debug!("DFT: {} samples, resolution {} Hz", n, fs / n as f64);

    let values = record
        .channels()
        .iter()
        .map(|ch| -> Result<Vec<Vec<Complex64>>> {
            let spectrum = fft.complex_spectrum(ch, n as f64)?;
            Ok(spectrum.into_iter().map(|z| vec![z]).collect())
        })
        .collect::<Result<Vec<_>>>()?;

    SpectralFrame::new(frequencies, vec![n as f64 / (2.0 * fs)], values)
}

/// Single-sided amplitude of a `1/N`-scaled one-sided spectrum of an
/// `n_samples` signal: doubled everywhere except DC and (even `N`) Nyquist.
pub fn single_sided_amplitude(spectrum: &[Complex64], n_samples: usize) -> Vec<f64> {
    let nyquist_bin = if n_samples % 2 == 0 {
        Some(n_samples / 2)
    } else {
        None
    };
    spectrum
        .iter()
        .enumerate()
        .map(|(k, z)| {
            if k == 0 || Some(k) == nyquist_bin {
                z.norm()
            } else {
                2.0 * z.norm()
            }
        })
        .collect()
}

/// Moving-average smoothing of a magnitude spectrum, window given in Hz.
pub fn smooth_spectrum(magnitude: &[f64], resolution: f64, window_hz: f64) -> Result<Vec<f64>> {
    if !(window_hz.is_finite() && window_hz >= 0.0) {
        return Err(ElecPhysError::validation(format!(
            "smoothing window must be non-negative, got {} Hz",
            window_hz
        )));
    }
    if resolution <= 0.0 {
        return Ok(magnitude.to_vec());
    }
    let bins = (window_hz / resolution).round().max(1.0) as usize;
    Ok(stats::moving_average(magnitude, bins))
}

/// Mean `|Z|` over the selected channels, laid out `[f][t]`.
pub fn channel_average_magnitude(
    frame: &SpectralFrame,
    channels: &ChannelSelection,
) -> Result<Vec<Vec<f64>>> {
    average_magnitude(std::slice::from_ref(frame), channels)
}

/// Mean `|Z|` over several frames and the selected channels.
///
/// All frames must share their frequency and time axes.
pub fn average_magnitude(
    frames: &[SpectralFrame],
    channels: &ChannelSelection,
) -> Result<Vec<Vec<f64>>> {
    let first = frames
        .first()
        .ok_or_else(|| ElecPhysError::validation("no spectral frames to average"))?;
    for (idx, frame) in frames.iter().enumerate().skip(1) {
        if frame.frequencies() != first.frequencies() || frame.times() != first.times() {
            return Err(ElecPhysError::format(format!(
                "spectral frame {} does not share the axes of frame 0",
                idx
            )));
        }
    }

    let mut acc = vec![vec![0.0; first.frame_count()]; first.bin_count()];
    let mut count = 0usize;
    for frame in frames {
        for ch in channels.resolve(frame.channel_count())? {
            for (acc_row, row) in acc.iter_mut().zip(&frame.values()[ch]) {
                for (a, z) in acc_row.iter_mut().zip(row) {
                    *a += z.norm();
                }
            }
            count += 1;
        }
    }

    let scale = 1.0 / count as f64;
    for row in acc.iter_mut() {
        for a in row.iter_mut() {
            *a *= scale;
        }
    }
    Ok(acc)
}

/// Zero-phase Butterworth low/high/band-pass filtering of every channel.
pub fn butterworth_filter(record: &TimeSeriesRecord, spec: &FilterSpec) -> Result<TimeSeriesRecord> {
    if matches!(spec, FilterSpec::Notch { .. }) {
        return Err(ElecPhysError::validation(
            "Butterworth filtering needs a lowpass, highpass or bandpass design",
        ));
    }
    let filter = SosFilter::design(spec, record.fs())?;
    let samples = record
        .channels()
        .iter()
        .map(|ch| filter.filtfilt(ch))
        .collect::<Result<Vec<_>>>()?;
    log::debug!(
        "Applied {} ({} sections) to {} channel(s)",
        spec,
        filter.sections().len(),
        samples.len()
    );
    Ok(record.with_samples(samples))
}

/// Magnitude response of a design, independent of any record.
pub fn filter_response(spec: &FilterSpec, fs: f64, n_points: usize) -> Result<FrequencyResponse> {
    dsp::frequency_response(spec, fs, n_points)
}
