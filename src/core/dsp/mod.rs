//! Digital Signal Processing utilities

pub mod fft;
pub mod filters;
pub mod stats;
pub mod windows;

pub use fft::FftProcessor;
pub use filters::{frequency_response, Biquad, FrequencyResponse, SosFilter};
pub use windows::WindowFunction;

/// Floor applied to dB conversions of zero magnitudes
pub const DB_FLOOR: f64 = -300.0;

/// Convert amplitude to dB (relative to 1.0)
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        (20.0 * amplitude.log10()).max(DB_FLOOR)
    } else {
        DB_FLOOR
    }
}
