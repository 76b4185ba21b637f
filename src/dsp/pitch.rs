//! Repitching
//!
//! A shift of `s` semitones scales frequency by `r = 2^(s/12)`.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::resample::{output_frames, resample_channels, ResamplerConfig};
use crate::dsp::stretch::{time_stretch, StretchConfig};
use crate::engine::Sample;
use crate::error::{Result, SampleError};

/// Largest shift accepted, in semitones either way
pub const MAX_SEMITONES: f64 = 48.0;

/// Shifts smaller than this are treated as no shift
const SEMITONE_EPSILON: f64 = 1e-9;

/// How a pitch shift treats duration
///
/// The two policies give different output lengths for the same shift:
///
/// | mode | duration | cost |
/// |------|----------|------|
/// | `Resample` | scales by `1 / r` (an octave up halves it) | one sinc pass; no artifacts beyond filtering |
/// | `PreserveDuration` | unchanged (±1 frame) | phase vocoder + sinc pass; transients smear, some phasiness |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepitchMode {
    /// Varispeed: read the sample faster or slower
    #[default]
    Resample,
    /// Stretch by `r` with the phase vocoder, then resample by `1 / r`
    PreserveDuration,
}

/// Frequency ratio for a shift in semitones
#[inline]
pub fn pitch_ratio(semitones: f64) -> f64 {
    2.0f64.powf(semitones / 12.0)
}

/// Check a semitone value before any work is done
pub fn check_semitones(semitones: f64) -> Result<()> {
    if !semitones.is_finite() || semitones.abs() > MAX_SEMITONES {
        return Err(SampleError::InvalidRequest {
            reason: format!(
                "pitch shift {} semitones outside ±{}",
                semitones, MAX_SEMITONES
            ),
        });
    }
    Ok(())
}

/// Shift the pitch of a sample by `semitones`
///
/// A zero shift returns a bit-identical copy.
pub fn repitch(
    sample: &Sample,
    semitones: f64,
    mode: RepitchMode,
    resampler: &ResamplerConfig,
    stretch: &StretchConfig,
) -> Result<Sample> {
    check_semitones(semitones)?;
    if semitones.abs() < SEMITONE_EPSILON {
        return Ok(sample.duplicate());
    }

    let ratio = pitch_ratio(semitones);
    debug!(
        "Repitching {} frames by {:+.3} st (ratio {:.5}, {:?})",
        sample.frames(),
        semitones,
        ratio,
        mode
    );

    match mode {
        RepitchMode::Resample => {
            let out = output_frames(sample.frames(), 1.0 / ratio);
            let channels = resample_channels(sample.channels(), 1.0 / ratio, out, resampler);
            sample.derive(channels, sample.sample_rate())
        }
        RepitchMode::PreserveDuration => {
            let stretched = time_stretch(sample, ratio, stretch)?;
            // Land exactly on the source length rather than round twice
            let out = sample.frames();
            let read_ratio = out as f64 / stretched.frames().max(1) as f64;
            let channels = resample_channels(stretched.channels(), read_ratio, out, resampler);
            sample.derive(channels, sample.sample_rate())
        }
    }
}
