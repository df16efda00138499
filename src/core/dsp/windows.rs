//! Window function implementations

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::error::ElecPhysError;

/// Window function types.
///
/// Coefficients are periodic (DFT-even), the convention for spectral
/// analysis with overlapping frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WindowFunction {
    Rectangular,
    #[default]
    Hann,
    Hamming,
    Blackman,
    BlackmanHarris,
    Kaiser(f64), // Beta parameter
}

impl WindowFunction {
    /// Generate `size` window coefficients
    pub fn generate(&self, size: usize) -> Vec<f64> {
        if size == 1 {
            return vec![1.0];
        }
        let n = size as f64;
        (0..size)
            .map(|i| {
                let x = i as f64;
                match *self {
                    WindowFunction::Rectangular => 1.0,
                    WindowFunction::Hann => 0.5 * (1.0 - (2.0 * PI * x / n).cos()),
                    WindowFunction::Hamming => 0.54 - 0.46 * (2.0 * PI * x / n).cos(),
                    WindowFunction::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * x / n).cos() + 0.08 * (4.0 * PI * x / n).cos()
                    }
                    WindowFunction::BlackmanHarris => {
                        0.35875 - 0.48829 * (2.0 * PI * x / n).cos()
                            + 0.14128 * (4.0 * PI * x / n).cos()
                            - 0.01168 * (6.0 * PI * x / n).cos()
                    }
                    WindowFunction::Kaiser(beta) => {
                        // periodic: first `size` points of a symmetric window of size + 1
                        let alpha = n / 2.0;
                        let ratio = (x - alpha) / alpha;
                        let arg = beta * (1.0 - ratio * ratio).max(0.0).sqrt();
                        bessel_i0(arg) / bessel_i0(beta)
                    }
                }
            })
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "boxcar",
            WindowFunction::Hann => "hann",
            WindowFunction::Hamming => "hamming",
            WindowFunction::Blackman => "blackman",
            WindowFunction::BlackmanHarris => "blackmanharris",
            WindowFunction::Kaiser(_) => "kaiser",
        }
    }
}

impl FromStr for WindowFunction {
    type Err = ElecPhysError;

    /// Parse `"<name> [parameter]"`, e.g. `"hann"` or `"kaiser 5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts.next().unwrap_or("").to_lowercase();
        let param = parts.next();
        if parts.next().is_some() {
            return Err(ElecPhysError::validation(format!(
                "window '{}' has too many parameters",
                s
            )));
        }

        let parse_param = |p: &str| {
            p.parse::<f64>().map_err(|_| {
                ElecPhysError::validation(format!("invalid window parameter '{}'", p))
            })
        };

        let window = match (name.as_str(), param) {
            ("boxcar" | "rectangular" | "rect", None) => WindowFunction::Rectangular,
            ("hann" | "hanning", None) => WindowFunction::Hann,
            ("hamming", None) => WindowFunction::Hamming,
            ("blackman", None) => WindowFunction::Blackman,
            ("blackmanharris" | "blackman-harris", None) => WindowFunction::BlackmanHarris,
            ("kaiser", Some(p)) => {
                let beta = parse_param(p)?;
                if !(beta.is_finite() && beta >= 0.0) {
                    return Err(ElecPhysError::validation(format!(
                        "kaiser beta must be non-negative, got {}",
                        beta
                    )));
                }
                WindowFunction::Kaiser(beta)
            }
            ("kaiser", None) => {
                return Err(ElecPhysError::validation(
                    "kaiser window needs a beta parameter, e.g. 'kaiser 5'",
                ))
            }
            (other, Some(_)) if !other.is_empty() => {
                return Err(ElecPhysError::validation(format!(
                    "window '{}' takes no parameter",
                    other
                )))
            }
            _ => {
                return Err(ElecPhysError::validation(format!(
                    "unknown window function '{}'",
                    s
                )))
            }
        };
        Ok(window)
    }
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowFunction::Kaiser(beta) => write!(f, "kaiser {}", beta),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl TryFrom<String> for WindowFunction {
    type Error = ElecPhysError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WindowFunction> for String {
    fn from(w: WindowFunction) -> Self {
        w.to_string()
    }
}

/// Modified Bessel function I0 (for Kaiser window)
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let x_half = x / 2.0;

    for k in 1..200 {
        term *= (x_half / k as f64).powi(2);
        sum += term;
        if term < 1e-16 * sum {
            break;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = WindowFunction::Hann.generate(4);
        assert!(window[0].abs() < 1e-12); // ~0 at the leading edge
        assert!((window[2] - 1.0).abs() < 1e-12); // 1 at the center
        assert!((window[1] - window[3]).abs() < 1e-12);
    }

    #[test]
    fn test_kaiser_peak_and_symmetry() {
        let w = WindowFunction::Kaiser(5.0).generate(64);
        assert!((w[32] - 1.0).abs() < 1e-12);
        assert!((w[1] - w[63]).abs() < 1e-12);
        assert!(w[0] < 0.1);
    }

    #[test]
    fn test_single_sample_window() {
        assert_eq!(WindowFunction::Hann.generate(1), vec![1.0]);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("hann".parse::<WindowFunction>().unwrap(), WindowFunction::Hann);
        assert_eq!("Kaiser 5".parse::<WindowFunction>().unwrap(), WindowFunction::Kaiser(5.0));
        assert!("kaiser".parse::<WindowFunction>().is_err());
        assert!("hann 3".parse::<WindowFunction>().is_err());
        assert!("tukey".parse::<WindowFunction>().is_err());
    }

    #[test]
    fn test_default_is_hann() {
        assert_eq!(WindowFunction::default(), WindowFunction::Hann);
        assert_eq!(crate::core::params::WindowSpec::default().window_function, WindowFunction::default());
    }

    #[test]
    fn test_display_round_trips() {
        for w in [WindowFunction::Blackman, WindowFunction::Kaiser(8.6)] {
            assert_eq!(w.to_string().parse::<WindowFunction>().unwrap(), w);
        }
    }
}
