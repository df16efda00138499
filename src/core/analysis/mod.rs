//! Signal conditioning and spectral analysis stages
//!
//! - `preprocess` - notch filtering, re-referencing, normalization
//! - `spectral` - STFT, full-record DFT, Butterworth filtering, filter responses
//! - `bandpower` - band-power series from spectral frames

mod bandpower;
mod preprocess;
mod spectral;

pub use bandpower::{AggregationMode, BandPowerAggregator};
pub use preprocess::{
    normalize, normalize_min_max, notch_filter, re_reference, zscore_normalize, Normalization,
    Preprocessor, ReferenceSpec,
};
pub use spectral::{
    average_magnitude, butterworth_filter, channel_average_magnitude, dft, filter_response,
    single_sided_amplitude, smooth_spectrum, stft, stft_frame_count, DEFAULT_RESPONSE_POINTS,
};
