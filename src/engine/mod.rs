//! Sample Engine Module
//!
//! Core sample handling:
//! - Sample data model and PCM formats
//! - WAV decode/encode with loop markers
//! - Buffer store with edit leases
//! - The edit pipeline

pub mod edit;
pub mod io;
pub mod sample;
pub mod store;

pub use edit::{apply_edit, EditRequest, EditResult, LoopSettings, Provenance, RegionSpec};
pub use io::{decode_wav, encode_wav, import_wav, ImportedWav};
pub use sample::{sine_wave, stereo_sine_wave, PcmFormat, Sample, SampleId};
pub use store::{BufferStore, EditLease};
