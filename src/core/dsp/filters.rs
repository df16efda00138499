//! IIR filter design and zero-phase application
//!
//! Butterworth designs go through the analog prototype, a frequency
//! transformation (low/high/band-pass) and the bilinear transform with
//! pre-warping, and end up as cascaded second-order sections. Every design
//! is checked for stability before use.

use num_complex::Complex64;
use rustfft::FftPlanner;
use std::f64::consts::PI;

use crate::core::params::FilterSpec;
use crate::error::{ElecPhysError, Result};

/// Second-order section `b0 + b1 z^-1 + b2 z^-2 / 1 + a1 z^-1 + a2 z^-2`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    /// Denominator with `a[0] == 1`
    pub a: [f64; 3],
}

impl Biquad {
    /// DC gain of the section
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[1] + self.a[2])
    }

    /// Steady-state state vector for a unit step input
    fn step_state(&self) -> [f64; 2] {
        let y = self.dc_gain();
        [y - self.b[0], self.b[2] - self.a[2] * y]
    }

    /// Transposed direct form II over `data`, starting from `state`
    fn run(&self, data: &mut [f64], mut state: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        for x in data.iter_mut() {
            let input = *x;
            let y = b0 * input + state[0];
            state[0] = b1 * input - a1 * y + state[1];
            state[1] = b2 * input - a2 * y;
            *x = y;
        }
    }

    /// Largest magnitude among the denominator roots
    fn pole_radius(&self) -> f64 {
        let [_, a1, a2] = self.a;
        let disc = a1 * a1 - 4.0 * a2;
        if disc < 0.0 {
            a2.abs().sqrt()
        } else {
            let root = disc.sqrt();
            ((-a1 + root) / 2.0).abs().max(((-a1 - root) / 2.0).abs())
        }
    }

    fn is_finite(&self) -> bool {
        self.b.iter().chain(self.a.iter()).all(|c| c.is_finite())
    }

    /// Whether both roots of the denominator lie strictly inside the unit circle
    fn is_stable(&self) -> bool {
        // Jury conditions for z^2 + a1 z + a2
        let [_, a1, a2] = self.a;
        a2.abs() < 1.0 && a1.abs() < 1.0 + a2
    }
}

/// Residual transient level that bounds the edge padding of `filtfilt`
const EDGE_DECAY: f64 = 1e-6;

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn new(sections: Vec<Biquad>) -> Result<Self> {
        if sections.is_empty() {
            return Err(ElecPhysError::computation("filter has no sections"));
        }
        if let Some(idx) = sections.iter().position(|s| !s.is_finite()) {
            return Err(ElecPhysError::computation(format!(
                "section {} has non-finite coefficients",
                idx
            )));
        }
        if let Some(idx) = sections.iter().position(|s| !s.is_stable()) {
            return Err(ElecPhysError::computation(format!(
                "section {} has poles on or outside the unit circle",
                idx
            )));
        }
        Ok(Self { sections })
    }

    /// Design the filter described by `spec` for sampling rate `fs`.
    pub fn design(spec: &FilterSpec, fs: f64) -> Result<Self> {
        spec.validate_for(fs)?;
        let sos = match *spec {
            FilterSpec::Notch { freq, quality } => vec![notch_section(freq, quality, fs)],
            FilterSpec::Lowpass { order, cutoff } => {
                let (z, p, k) = butter_analog(order);
                let wc = prewarp(cutoff, fs);
                let (z, p, k) = lp_to_lp(&z, &p, k, wc);
                zpk_to_sos(bilinear(&z, &p, k))?
            }
            FilterSpec::Highpass { order, cutoff } => {
                let (z, p, k) = butter_analog(order);
                let wc = prewarp(cutoff, fs);
                let (z, p, k) = lp_to_hp(&z, &p, k, wc);
                zpk_to_sos(bilinear(&z, &p, k))?
            }
            FilterSpec::Bandpass { order, low, high } => {
                let (z, p, k) = butter_analog(order);
                let w1 = prewarp(low, fs);
                let w2 = prewarp(high, fs);
                let (z, p, k) = lp_to_bp(&z, &p, k, (w1 * w2).sqrt(), w2 - w1);
                zpk_to_sos(bilinear(&z, &p, k))?
            }
        };
        log::debug!("Designed {} as {} second-order section(s)", spec, sos.len());
        Self::new(sos)
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Minimum odd-extension padding used by `filtfilt`; shorter signals
    /// are rejected.
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Samples until the slowest pole decays below `EDGE_DECAY`
    pub fn decay_len(&self) -> usize {
        let r = self
            .sections
            .iter()
            .map(|s| s.pole_radius())
            .fold(0.0_f64, f64::max);
        if r <= 0.0 {
            return 0;
        }
        (EDGE_DECAY.ln() / r.ln()).ceil() as usize
    }

    /// Padding for a signal of `n` samples: at least `pad_len`, extended to
    /// the decay length while staying below `n`.
    fn edge_len(&self, n: usize) -> usize {
        self.pad_len().max(self.decay_len().min(n - 1))
    }

    /// Causal filtering from rest
    pub fn filter(&self, data: &[f64]) -> Vec<f64> {
        let mut out = data.to_vec();
        for section in &self.sections {
            section.run(&mut out, [0.0, 0.0]);
        }
        out
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// The signal is padded by odd reflection at both ends and each pass
    /// starts from the steady state for its first sample, so start-up
    /// transients die out inside the padding. Fails if the signal is not
    /// longer than `pad_len`.
    pub fn filtfilt(&self, data: &[f64]) -> Result<Vec<f64>> {
        let n = data.len();
        if n <= self.pad_len() {
            return Err(ElecPhysError::validation(format!(
                "zero-phase filtering needs more than {} samples, record has {}",
                self.pad_len(),
                n
            )));
        }
        let edge = self.edge_len(n);

        let mut ext = odd_extend(data, edge);
        let zi = self.step_states();

        let x0 = ext[0];
        self.run_from(&mut ext, &zi, x0);
        ext.reverse();
        let y0 = ext[0];
        self.run_from(&mut ext, &zi, y0);
        ext.reverse();

        Ok(ext[edge..edge + n].to_vec())
    }

    fn run_from(&self, data: &mut [f64], zi: &[[f64; 2]], scale: f64) {
        for (section, z) in self.sections.iter().zip(zi) {
            section.run(data, [z[0] * scale, z[1] * scale]);
        }
    }

    /// Per-section initial states for a unit step through the whole cascade
    fn step_states(&self) -> Vec<[f64; 2]> {
        let mut gain = 1.0;
        self.sections
            .iter()
            .map(|s| {
                let [z0, z1] = s.step_state();
                let state = [z0 * gain, z1 * gain];
                gain *= s.dc_gain();
                state
            })
            .collect()
    }

    /// Complex response `H(e^{jw})` at `n_points` frequencies
    /// `w_k = pi k / n_points`, evaluated per section via zero-padded FFTs of
    /// the coefficient vectors.
    pub fn response(&self, n_points: usize) -> Result<Vec<Complex64>> {
        if n_points == 0 {
            return Err(ElecPhysError::validation("frequency grid needs at least one point"));
        }
        let size = 2 * n_points;
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);

        let transform = |coeffs: &[f64; 3]| {
            let mut buffer = vec![Complex64::new(0.0, 0.0); size];
            // grid points are multiples of 2pi/size, so taps beyond `size` wrap
            for (i, &c) in coeffs.iter().enumerate() {
                buffer[i % size] += Complex64::new(c, 0.0);
            }
            fft.process(&mut buffer);
            buffer.truncate(n_points);
            buffer
        };

        let mut h = vec![Complex64::new(1.0, 0.0); n_points];
        for (idx, section) in self.sections.iter().enumerate() {
            let num = transform(&section.b);
            let den = transform(&section.a);
            for ((hk, nk), dk) in h.iter_mut().zip(num).zip(den) {
                if dk.norm() < 1e-300 {
                    return Err(ElecPhysError::computation(format!(
                        "section {} has a pole on the evaluation grid",
                        idx
                    )));
                }
                *hk *= nk / dk;
            }
        }

        if h.iter().any(|v| !(v.re.is_finite() && v.im.is_finite())) {
            return Err(ElecPhysError::computation("frequency response is not finite"));
        }
        Ok(h)
    }
}

/// Frequency grid and magnitude (dB) of a designed filter
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrequencyResponse {
    pub frequency_grid: Vec<f64>,
    pub magnitude_db: Vec<f64>,
}

impl FrequencyResponse {
    /// Magnitude in dB at the grid point nearest `freq`
    pub fn magnitude_at(&self, freq: f64) -> Option<f64> {
        let idx = self
            .frequency_grid
            .iter()
            .enumerate()
            .min_by(|a, b| {
                (a.1 - freq)
                    .abs()
                    .partial_cmp(&(b.1 - freq).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?
            .0;
        self.magnitude_db.get(idx).copied()
    }
}

/// Evaluate the designed filter on `n_points` frequencies from 0 up to
/// (excluding) Nyquist.
pub fn frequency_response(spec: &FilterSpec, fs: f64, n_points: usize) -> Result<FrequencyResponse> {
    let filter = SosFilter::design(spec, fs)?;
    let h = filter.response(n_points)?;
    let step = fs / 2.0 / n_points as f64;
    Ok(FrequencyResponse {
        frequency_grid: (0..n_points).map(|k| k as f64 * step).collect(),
        magnitude_db: h.iter().map(|v| super::amplitude_to_db(v.norm())).collect(),
    })
}

/// Second-order notch at `f0` with `-3 dB` bandwidth `f0 / q`
fn notch_section(f0: f64, q: f64, fs: f64) -> Biquad {
    let w0 = 2.0 * PI * f0 / fs;
    let bw = w0 / q;
    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let cos_w0 = w0.cos();
    Biquad {
        b: [gain, -2.0 * gain * cos_w0, gain],
        a: [1.0, -2.0 * gain * cos_w0, 2.0 * gain - 1.0],
    }
}

// Designs are carried out on the normalized frequency axis (Nyquist = 1,
// bilinear sampling rate 2).
const BILINEAR_FS: f64 = 2.0;

type Zpk = (Vec<Complex64>, Vec<Complex64>, f64);

fn prewarp(freq: f64, fs: f64) -> f64 {
    let normalized = freq / (fs / 2.0);
    2.0 * BILINEAR_FS * (PI * normalized / BILINEAR_FS).tan()
}

/// Analog Butterworth prototype: unit cutoff, no zeros
fn butter_analog(order: usize) -> Zpk {
    let n = order as f64;
    let poles = (0..order)
        .map(|i| {
            let m = -(n - 1.0) + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();
    (Vec::new(), poles, 1.0)
}

fn lp_to_lp(z: &[Complex64], p: &[Complex64], k: f64, wo: f64) -> Zpk {
    let degree = p.len() - z.len();
    (
        z.iter().map(|v| *v * wo).collect(),
        p.iter().map(|v| *v * wo).collect(),
        k * wo.powi(degree as i32),
    )
}

fn lp_to_hp(z: &[Complex64], p: &[Complex64], k: f64, wo: f64) -> Zpk {
    let degree = p.len() - z.len();
    let mut z_hp: Vec<Complex64> = z.iter().map(|v| wo / *v).collect();
    let p_hp = p.iter().map(|v| wo / *v).collect();
    z_hp.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

    let num: Complex64 = z.iter().map(|v| -*v).product();
    let den: Complex64 = p.iter().map(|v| -*v).product();
    (z_hp, p_hp, k * (num / den).re)
}

fn lp_to_bp(z: &[Complex64], p: &[Complex64], k: f64, wo: f64, bw: f64) -> Zpk {
    let degree = p.len() - z.len();
    let split = |roots: &[Complex64]| -> Vec<Complex64> {
        let scaled: Vec<Complex64> = roots.iter().map(|v| *v * (bw / 2.0)).collect();
        let offsets: Vec<Complex64> = scaled.iter().map(|v| (*v * *v - wo * wo).sqrt()).collect();
        scaled
            .iter()
            .zip(&offsets)
            .map(|(v, d)| *v + *d)
            .chain(scaled.iter().zip(&offsets).map(|(v, d)| *v - *d))
            .collect()
    };

    let mut z_bp = split(z);
    let p_bp = split(p);
    z_bp.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));
    (z_bp, p_bp, k * bw.powi(degree as i32))
}

fn bilinear(z: &[Complex64], p: &[Complex64], k: f64) -> Zpk {
    let fs2 = Complex64::new(2.0 * BILINEAR_FS, 0.0);
    let degree = p.len() - z.len();

    let mut z_d: Vec<Complex64> = z.iter().map(|v| (fs2 + *v) / (fs2 - *v)).collect();
    let p_d = p.iter().map(|v| (fs2 + *v) / (fs2 - *v)).collect();
    z_d.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

    let num: Complex64 = z.iter().map(|v| fs2 - *v).product();
    let den: Complex64 = p.iter().map(|v| fs2 - *v).product();
    (z_d, p_d, k * (num / den).re)
}

const CONJ_TOL: f64 = 1e-9;

/// One real quadratic or linear factor `1 - c1 z^-1 + c2 z^-2`
#[derive(Debug, Clone, Copy)]
enum Factor {
    Quadratic([f64; 3]),
    Linear([f64; 3]),
}

/// Group roots into conjugate-pair quadratics and real factors.
/// Real roots are paired outermost-first after sorting, so a set of
/// `{-1, +1}` zeros yields `1 - z^-2` factors.
fn factor_roots(roots: &[Complex64]) -> Vec<Factor> {
    let mut factors = Vec::new();
    let mut real: Vec<f64> = Vec::new();

    for r in roots {
        if r.im.abs() <= CONJ_TOL * r.norm().max(1.0) {
            real.push(r.re);
        } else if r.im > 0.0 {
            factors.push(Factor::Quadratic([1.0, -2.0 * r.re, r.norm_sqr()]));
        }
    }

    real.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let (mut lo, mut hi) = (0usize, real.len());
    while hi - lo >= 2 {
        let (r1, r2) = (real[lo], real[hi - 1]);
        factors.push(Factor::Quadratic([1.0, -(r1 + r2), r1 * r2]));
        lo += 1;
        hi -= 1;
    }
    if hi - lo == 1 {
        factors.push(Factor::Linear([1.0, -real[lo], 0.0]));
    }
    factors
}

fn zpk_to_sos((z, p, k): Zpk) -> Result<Vec<Biquad>> {
    if z.len() != p.len() {
        return Err(ElecPhysError::computation(format!(
            "design has {} zeros for {} poles",
            z.len(),
            p.len()
        )));
    }
    if !k.is_finite() || k == 0.0 {
        return Err(ElecPhysError::computation(format!("degenerate design gain {}", k)));
    }

    let poles = factor_roots(&p);
    let zeros = factor_roots(&z);

    let (mut zero_quads, mut zero_lins): (Vec<_>, Vec<_>) =
        zeros.into_iter().partition(|f| matches!(f, Factor::Quadratic(_)));

    let mut sections = Vec::with_capacity(poles.len());
    for pole in poles {
        let (a, wanted) = match pole {
            Factor::Quadratic(a) => (a, 2),
            Factor::Linear(a) => (a, 1),
        };
        let b = if wanted == 2 {
            match zero_quads.pop() {
                Some(Factor::Quadratic(b)) => b,
                _ => combine_linear(&mut zero_lins)?,
            }
        } else {
            match zero_lins.pop() {
                Some(Factor::Linear(b)) => b,
                _ => {
                    return Err(ElecPhysError::computation(
                        "cannot pair a first-order pole with a single zero",
                    ))
                }
            }
        };
        sections.push(Biquad { b, a });
    }

    if let Some(first) = sections.first_mut() {
        for c in first.b.iter_mut() {
            *c *= k;
        }
    }
    Ok(sections)
}

fn combine_linear(lins: &mut Vec<Factor>) -> Result<[f64; 3]> {
    match (lins.pop(), lins.pop()) {
        (Some(Factor::Linear([_, c1, _])), Some(Factor::Linear([_, c2, _]))) => {
            Ok([1.0, c1 + c2, c1 * c2])
        }
        _ => Err(ElecPhysError::computation("unbalanced zero/pole pairing")),
    }
}

/// Odd reflection of `n` samples about each endpoint
fn odd_extend(data: &[f64], n: usize) -> Vec<f64> {
    let len = data.len();
    let first = data[0];
    let last = data[len - 1];
    let mut ext = Vec::with_capacity(len + 2 * n);
    ext.extend((1..=n).rev().map(|i| 2.0 * first - data[i]));
    ext.extend_from_slice(data);
    ext.extend((1..=n).map(|i| 2.0 * last - data[len - 1 - i]));
    ext
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_butter_lowpass_order2_coefficients() {
        // Reference: scipy.signal.butter(2, 0.2, output='sos')
        let spec = FilterSpec::lowpass(2, 100.0).unwrap();
        let f = SosFilter::design(&spec, 1000.0).unwrap();
        assert_eq!(f.sections().len(), 1);
        let s = f.sections()[0];
        let expected_b = [0.06745527, 0.13491055, 0.06745527];
        let expected_a = [1.0, -1.1429805, 0.4128016];
        for i in 0..3 {
            assert!((s.b[i] - expected_b[i]).abs() < 1e-6, "b[{}] = {}", i, s.b[i]);
            assert!((s.a[i] - expected_a[i]).abs() < 1e-6, "a[{}] = {}", i, s.a[i]);
        }
    }

    #[test]
    fn test_section_counts() {
        let fs = 1000.0;
        let odd = SosFilter::design(&FilterSpec::lowpass(5, 100.0).unwrap(), fs).unwrap();
        assert_eq!(odd.sections().len(), 3);
        let bp = SosFilter::design(&FilterSpec::bandpass(3, 50.0, 100.0).unwrap(), fs).unwrap();
        assert_eq!(bp.sections().len(), 3);
    }

    #[test]
    fn test_response_shapes() {
        let fs = 1000.0;
        let lp = frequency_response(&FilterSpec::lowpass(4, 100.0).unwrap(), fs, 500).unwrap();
        assert!(lp.magnitude_at(0.0).unwrap().abs() < 1e-6);
        assert!((lp.magnitude_at(100.0).unwrap() + 3.0103).abs() < 0.05);
        assert!(lp.magnitude_at(400.0).unwrap() < -40.0);

        let hp = frequency_response(&FilterSpec::highpass(4, 100.0).unwrap(), fs, 500).unwrap();
        assert!(hp.magnitude_at(0.0).unwrap() < -100.0);
        assert!((hp.magnitude_at(100.0).unwrap() + 3.0103).abs() < 0.05);

        let bp = frequency_response(&FilterSpec::bandpass(2, 50.0, 100.0).unwrap(), fs, 500).unwrap();
        assert!(bp.magnitude_at(71.0).unwrap().abs() < 0.5);
        assert!(bp.magnitude_at(5.0).unwrap() < -20.0);
        assert!(bp.magnitude_at(300.0).unwrap() < -20.0);
    }

    #[test]
    fn test_notch_response() {
        let fs = 1000.0;
        let r = frequency_response(&FilterSpec::notch(50.0, 30.0).unwrap(), fs, 1000).unwrap();
        assert_eq!(r.frequency_grid.len(), 1000);
        assert!(r.magnitude_at(50.0).unwrap() < -60.0);
        assert!(r.magnitude_at(10.0).unwrap().abs() < 0.1);
    }

    #[test]
    fn test_filtfilt_zero_phase() {
        let fs = 1000.0;
        let x = sine(10.0, fs, 2000);
        let f = SosFilter::design(&FilterSpec::lowpass(4, 100.0).unwrap(), fs).unwrap();
        let y = f.filtfilt(&x).unwrap();
        // passband sine comes through in phase, away from the edges
        for i in 200..1800 {
            assert!((y[i] - x[i]).abs() < 1e-3, "sample {} differs: {} vs {}", i, y[i], x[i]);
        }
    }

    #[test]
    fn test_filtfilt_attenuates_stopband() {
        let fs = 1000.0;
        let x = sine(300.0, fs, 2000);
        let f = SosFilter::design(&FilterSpec::lowpass(4, 50.0).unwrap(), fs).unwrap();
        let y = f.filtfilt(&x).unwrap();
        assert!(rms(&y[100..1900]) < 1e-3 * rms(&x));
    }

    #[test]
    fn test_filtfilt_constant_passes_through() {
        let f = SosFilter::design(&FilterSpec::lowpass(2, 20.0).unwrap(), 500.0).unwrap();
        let y = f.filtfilt(&[3.0; 100]).unwrap();
        assert!(y.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_filtfilt_rejects_short_input() {
        let f = SosFilter::design(&FilterSpec::notch(50.0, 30.0).unwrap(), 1000.0).unwrap();
        assert_eq!(f.pad_len(), 9);
        assert!(f.filtfilt(&[0.0; 9]).unwrap_err().is_validation());
        assert!(f.filtfilt(&[0.0; 10]).is_ok());
    }

    #[test]
    fn test_decay_len_tracks_pole_radius() {
        let fs = 1000.0;
        let notch = SosFilter::design(&FilterSpec::notch(50.0, 30.0).unwrap(), fs).unwrap();
        let lp = SosFilter::design(&FilterSpec::lowpass(2, 200.0).unwrap(), fs).unwrap();
        assert!(notch.decay_len() > 1000);
        assert!(lp.decay_len() < notch.decay_len());
        assert_eq!(notch.edge_len(500), 499);
    }

    #[test]
    fn test_unstable_section_rejected() {
        let bad = Biquad {
            b: [1.0, 0.0, 0.0],
            a: [1.0, 0.0, 1.5],
        };
        assert!(SosFilter::new(vec![bad]).unwrap_err().is_computation());
    }

    #[test]
    fn test_design_checks_nyquist() {
        let spec = FilterSpec::highpass(2, 600.0).unwrap();
        assert!(SosFilter::design(&spec, 1000.0).unwrap_err().is_validation());
    }

    #[test]
    fn test_odd_extend() {
        let ext = odd_extend(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }
}
