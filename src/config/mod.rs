//! Configuration: pipeline settings and band presets

mod pipeline;
mod presets;

pub use pipeline::{PipelineBuilder, PipelineConfig};
pub use presets::BandPreset;
