//! Sample-rate conversion
//!
//! Band-limited resampling with a windowed-sinc kernel. When the output
//! rate is lower than the input rate the kernel cutoff drops with the ratio
//! so content above the new Nyquist is filtered instead of aliasing.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::kernel::{SincKernel, WindowKind};
use crate::engine::Sample;
use crate::error::{Result, SampleError};

/// Lowest sample rate accepted as a conversion target
pub const MIN_SAMPLE_RATE: u32 = 1_000;

/// Highest sample rate accepted as a conversion target
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Resampler quality settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplerConfig {
    /// Zero crossings of the sinc on each side of the read position
    pub zero_crossings: usize,
    /// Window applied to the sinc
    pub window: WindowKind,
    /// Pass band as a fraction of the lower Nyquist (leaves room for the
    /// transition band)
    pub rolloff: f64,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            zero_crossings: 32,
            window: WindowKind::Blackman,
            rolloff: 0.95,
        }
    }
}

impl ResamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(4..=256).contains(&self.zero_crossings) {
            return Err(SampleError::InvalidConfig {
                reason: format!(
                    "resampler zero_crossings {} outside 4..=256",
                    self.zero_crossings
                ),
            });
        }
        if !(self.rolloff > 0.5 && self.rolloff <= 1.0) {
            return Err(SampleError::InvalidConfig {
                reason: format!("resampler rolloff {} outside (0.5, 1.0]", self.rolloff),
            });
        }
        Ok(())
    }

    fn kernel_for(&self, ratio: f64) -> SincKernel {
        SincKernel::new(self.rolloff * ratio.min(1.0), self.zero_crossings, self.window)
    }
}

/// Convert a sample to `target_rate`
///
/// The output has `round(frames * target_rate / source_rate)` frames. A
/// target equal to the current rate returns an identical copy.
///
/// # Errors
/// * `InvalidRequest` - `target_rate` outside the supported range
pub fn resample(sample: &Sample, target_rate: u32, config: &ResamplerConfig) -> Result<Sample> {
    check_rate(target_rate)?;
    if target_rate == sample.sample_rate() {
        return Ok(sample.duplicate());
    }

    let ratio = target_rate as f64 / sample.sample_rate() as f64;
    let out_frames = output_frames(sample.frames(), ratio);
    debug!(
        "Resampling {} frames {} Hz -> {} Hz ({} frames)",
        sample.frames(),
        sample.sample_rate(),
        target_rate,
        out_frames
    );

    let channels = resample_channels(sample.channels(), ratio, out_frames, config);
    sample.derive(channels, target_rate)
}

/// Read a sample at a different speed, keeping its sample rate
///
/// `ratio > 1` stretches (more frames, lower pitch), `ratio < 1` compresses
/// (fewer frames, higher pitch).
pub fn resample_by_ratio(sample: &Sample, ratio: f64, config: &ResamplerConfig) -> Result<Sample> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(SampleError::InvalidRequest {
            reason: format!("resampling ratio {} must be positive and finite", ratio),
        });
    }
    let out_frames = output_frames(sample.frames(), ratio);
    let channels = resample_channels(sample.channels(), ratio, out_frames, config);
    sample.derive(channels, sample.sample_rate())
}

/// Resample every channel to exactly `out_frames` frames
pub(crate) fn resample_channels(
    channels: &[Vec<f32>],
    ratio: f64,
    out_frames: usize,
    config: &ResamplerConfig,
) -> Vec<Vec<f32>> {
    let kernel = config.kernel_for(ratio);
    channels
        .iter()
        .map(|input| {
            (0..out_frames)
                .map(|n| kernel.interpolate(input, n as f64 / ratio))
                .collect()
        })
        .collect()
}

/// Output length for a given ratio (never zero for a non-empty input)
pub(crate) fn output_frames(frames: usize, ratio: f64) -> usize {
    if frames == 0 {
        return 0;
    }
    ((frames as f64 * ratio).round() as usize).max(1)
}

pub(crate) fn check_rate(rate: u32) -> Result<()> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
        return Err(SampleError::InvalidRequest {
            reason: format!(
                "target sample rate {} Hz outside {}..={} Hz",
                rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sample::{channel_rms, sine_wave};
    use crate::engine::PcmFormat;
    use test_case::test_case;

    fn tone(rate: u32) -> Sample {
        sine_wave(440.0, 0.5, rate, 0.7, PcmFormat::Float32).unwrap()
    }

    #[test_case(48000, 44100 ; "48k to 44k1")]
    #[test_case(44100, 96000 ; "44k1 to 96k")]
    #[test_case(48000, 22050 ; "48k to 22k05")]
    fn test_round_trip_preserves_length_and_energy(from: u32, to: u32) {
        let config = ResamplerConfig::default();
        let original = tone(from);

        let there = resample(&original, to, &config).unwrap();
        assert_eq!(there.sample_rate(), to);
        let back = resample(&there, from, &config).unwrap();

        let diff = back.frames() as i64 - original.frames() as i64;
        assert!(diff.abs() <= 1, "frame count drifted by {}", diff);

        let rms_orig = channel_rms(original.channel(0));
        let rms_back = channel_rms(back.channel(0));
        assert!(
            (rms_back / rms_orig - 1.0).abs() < 0.01,
            "rms {} vs {}",
            rms_back,
            rms_orig
        );
    }

    #[test]
    fn test_expected_length() {
        let config = ResamplerConfig::default();
        let out = resample(&tone(48000), 44100, &config).unwrap();
        assert_eq!(out.frames(), 22050);
    }

    #[test]
    fn test_same_rate_is_identity() {
        let original = tone(48000);
        let out = resample(&original, 48000, &ResamplerConfig::default()).unwrap();
        assert_eq!(out, original);
        assert_ne!(out.id(), original.id());
    }

    #[test]
    fn test_downsampling_removes_content_above_nyquist() {
        // 15 kHz can't exist at 16 kHz; it must be filtered, not folded to 1 kHz
        let high = sine_wave(15_000.0, 0.25, 48000, 0.7, PcmFormat::Float32).unwrap();
        let out = resample(&high, 16000, &ResamplerConfig::default()).unwrap();
        let rms = channel_rms(&out.channel(0)[100..out.frames() - 100]);
        assert!(rms < 0.01, "aliased energy {}", rms);
    }

    #[test_case(0 ; "zero")]
    #[test_case(500 ; "too low")]
    #[test_case(1_000_000 ; "too high")]
    fn test_rejects_unsupported_rate(rate: u32) {
        assert!(matches!(
            resample(&tone(48000), rate, &ResamplerConfig::default()),
            Err(SampleError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_resample_by_ratio_length() {
        let config = ResamplerConfig::default();
        let out = resample_by_ratio(&tone(48000), 0.5, &config).unwrap();
        assert_eq!(out.frames(), 12000);
        assert_eq!(out.sample_rate(), 48000);
        assert!(resample_by_ratio(&tone(48000), 0.0, &config).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(ResamplerConfig::default().validate().is_ok());
        let bad = ResamplerConfig {
            zero_crossings: 2,
            ..ResamplerConfig::default()
        };
        assert!(matches!(bad.validate(), Err(SampleError::InvalidConfig { .. })));
    }
}
