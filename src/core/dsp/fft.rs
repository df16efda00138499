//! FFT processing with windowing

use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use super::windows::WindowFunction;
use crate::error::{ElecPhysError, Result};

/// One-sided FFT of fixed-size real frames with an optional window.
pub struct FftProcessor {
    fft: Arc<dyn RealToComplex<f64>>,
    window: Vec<f64>,
    window_sum: f64,
    input: Vec<f64>,
    output: Vec<Complex64>,
    fft_size: usize,
}

impl FftProcessor {
    pub fn new(fft_size: usize, window_fn: WindowFunction) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = window_fn.generate(fft_size);
        let window_sum = window.iter().sum();
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        Self {
            fft,
            window,
            window_sum,
            input,
            output,
            fft_size,
        }
    }

    /// Number of one-sided bins (`fft_size / 2 + 1`)
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Bin center frequencies for a sampling rate
    pub fn frequencies(&self, fs: f64) -> Vec<f64> {
        (0..self.bin_count())
            .map(|k| k as f64 * fs / self.fft_size as f64)
            .collect()
    }

    pub fn window_sum(&self) -> f64 {
        self.window_sum
    }

    /// Complex one-sided spectrum of `frame` after windowing, scaled by
    /// `1 / scale`. A frame shorter than `fft_size` is zero-padded.
    pub fn complex_spectrum(&mut self, frame: &[f64], scale: f64) -> Result<Vec<Complex64>> {
        for (i, slot) in self.input.iter_mut().enumerate() {
            *slot = frame.get(i).copied().unwrap_or(0.0) * self.window[i];
        }

        self.fft
            .process(&mut self.input, &mut self.output)
            .map_err(|e| ElecPhysError::computation(format!("FFT failed: {}", e)))?;

        Ok(self.output.iter().map(|c| *c / scale).collect())
    }

    /// Spectrum scaled by the window sum, so a sinusoid of amplitude `A`
    /// centred on a bin reads `A / 2`.
    pub fn scaled_spectrum(&mut self, frame: &[f64]) -> Result<Vec<Complex64>> {
        let scale = self.window_sum;
        if scale <= 0.0 {
            return Err(ElecPhysError::computation("window coefficients sum to zero"));
        }
        self.complex_spectrum(frame, scale)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_bin_layout() {
        let fft = FftProcessor::new(1000, WindowFunction::Hann);
        assert_eq!(fft.bin_count(), 501);
        let f = fft.frequencies(1000.0);
        assert_eq!(f[0], 0.0);
        assert!((f[500] - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_sinusoid_amplitude() {
        let n = 256;
        let fs = 256.0;
        let frame: Vec<f64> = (0..n).map(|i| 3.0 * (2.0 * PI * 32.0 * i as f64 / fs).sin()).collect();
        let mut fft = FftProcessor::new(n, WindowFunction::Hann);
        let spec = fft.scaled_spectrum(&frame).unwrap();
        assert!((spec[32].norm() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_odd_length() {
        let mut fft = FftProcessor::new(7, WindowFunction::Rectangular);
        let spec = fft.complex_spectrum(&[1.0; 7], 1.0).unwrap();
        assert_eq!(spec.len(), 4);
        assert!((spec[0].re - 7.0).abs() < 1e-12);
        assert!(spec[1].norm() < 1e-12);
    }
}
