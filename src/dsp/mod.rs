//! DSP Library
//!
//! Offline sample-editing algorithms. Every operation reads an immutable
//! `Sample` and returns a new one; nothing is modified in place.

pub mod dither;
pub mod kernel;
pub mod pitch;
pub mod region;
pub mod resample;
pub mod seam;
pub mod stretch;

pub use dither::quantize;
pub use kernel::{SincKernel, WindowKind};
pub use pitch::{pitch_ratio, repitch, RepitchMode, MAX_SEMITONES};
pub use region::{
    default_crossfade, define_loop, define_region, define_region_normalized, seam_source, trim,
    LoopPoint, Region, SeamSource,
};
pub use resample::{resample, resample_by_ratio, ResamplerConfig};
pub use seam::{build_seamless_loop, equal_power_gains};
pub use stretch::{time_stretch, StretchConfig};
