// src/intensity/mod.rs
pub mod cache;
pub mod providers;
pub mod types;

pub use cache::IntensityCache;
pub use types::{
    CarbonIntensitySample, IntensitySnapshot, IntensitySource, SampleOrigin, TimeWindow,
};
