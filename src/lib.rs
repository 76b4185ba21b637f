//! Samplecraft - Offline Sample Editing
//!
//! Trims, loops, repitches and resamples audio samples, then saves the
//! result atomically as WAV.
//!
//! # Architecture
//!
//! - Engine: immutable `Sample` buffers, the `BufferStore` that owns them, the
//!   WAV codec and the edit pipeline
//! - DSP: region/loop editing, windowed-sinc resampling, phase-vocoder time
//!   stretching and quantization
//! - Save: temp-file-and-rename writes, optionally on a background worker
//!
//! `SampleEditor` ties these together for a host application.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod editor;
pub mod engine;
pub mod error;
pub mod save;

pub use config::EditorConfig;
pub use editor::SampleEditor;
pub use engine::{EditRequest, EditResult, PcmFormat, Sample, SampleId};
pub use error::{Result, SampleError};
