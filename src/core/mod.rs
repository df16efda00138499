//! Data model, DSP primitives and the analysis stages built on them

pub mod analysis;
pub mod dsp;
pub mod params;
pub mod pipeline;
pub mod record;

pub use analysis::{
    AggregationMode, BandPowerAggregator, Normalization, Preprocessor, ReferenceSpec,
};
pub use pipeline::{Pipeline, PipelineOutput};
pub use params::{ChannelSelection, FilterSpec, FrequencyBand, WindowSpec};
pub use record::{BandPowerSeries, SpectralFrame, TimeSeriesRecord};
