//! Sample storage type
//!
//! A `Sample` is an immutable PCM buffer: once constructed its frames and
//! format never change. Edits always produce a new `Sample` with a new id.
//! Channels are stored non-interleaved as `f32` in the range [-1.0, 1.0].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SampleError};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Linear RMS of a channel slice, accumulated in f64
pub fn channel_rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

// ============================================================================
// Sample Id
// ============================================================================

/// Unique identity of a sample held by the buffer store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(Uuid);

impl SampleId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        SampleId(Uuid::new_v4())
    }
}

impl Default for SampleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// PCM Format
// ============================================================================

/// Storage format of a sample on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PcmFormat {
    /// Signed integer PCM with the given bit depth (8, 16, 24 or 32)
    Int { bits: u16 },
    /// IEEE 32-bit float PCM
    Float32,
}

impl Default for PcmFormat {
    fn default() -> Self {
        PcmFormat::Int { bits: 24 }
    }
}

impl PcmFormat {
    /// Build a format, rejecting bit depths the codec can't carry
    pub fn int(bits: u16) -> Result<Self> {
        let format = PcmFormat::Int { bits };
        format.check()?;
        Ok(format)
    }

    /// Bits stored per sample
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            PcmFormat::Int { bits } => *bits,
            PcmFormat::Float32 => 32,
        }
    }

    /// Verify the format is one the engine can quantize to and encode
    pub fn check(&self) -> Result<()> {
        match self {
            PcmFormat::Int { bits: 8 | 16 | 24 | 32 } | PcmFormat::Float32 => Ok(()),
            PcmFormat::Int { bits } => Err(SampleError::UnsupportedFormat {
                format: format!("{}-bit integer audio (only 8, 16, 24, 32 supported)", bits),
            }),
        }
    }

    /// Full-scale value for integer formats (2^(bits-1))
    pub fn full_scale(&self) -> Option<f64> {
        match self {
            PcmFormat::Int { bits } => Some((1u64 << (bits - 1)) as f64),
            PcmFormat::Float32 => None,
        }
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PcmFormat::Int { bits } => write!(f, "{}-bit int", bits),
            PcmFormat::Float32 => write!(f, "32-bit float"),
        }
    }
}

// ============================================================================
// Sample
// ============================================================================

/// Immutable decoded audio sample
///
/// # Example
/// ```
/// use samplecraft::engine::{PcmFormat, Sample};
///
/// let sample = Sample::new(vec![vec![0.0; 480]; 2], 48000, PcmFormat::Int { bits: 16 }).unwrap();
/// assert_eq!(sample.num_channels(), 2);
/// assert_eq!(sample.frames(), 480);
/// ```
#[derive(Debug, Clone)]
pub struct Sample {
    id: SampleId,
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    format: PcmFormat,
}

impl Sample {
    /// Create a sample from non-interleaved channel data
    ///
    /// # Errors
    /// * `UnsupportedFormat` - no channels, zero sample rate or unsupported bit depth
    /// * `InvalidAudio` - channels of differing length
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32, format: PcmFormat) -> Result<Self> {
        if channels.is_empty() {
            return Err(SampleError::UnsupportedFormat {
                format: "audio with zero channels".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(SampleError::UnsupportedFormat {
                format: "sample rate of 0 Hz".to_string(),
            });
        }
        format.check()?;

        let frames = channels[0].len();
        if let Some((ch, data)) = channels
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() != frames)
        {
            return Err(SampleError::InvalidAudio {
                reason: format!(
                    "channel {} has {} frames, channel 0 has {}",
                    ch,
                    data.len(),
                    frames
                ),
                source: None,
            });
        }

        Ok(Self {
            id: SampleId::new(),
            channels,
            sample_rate,
            format,
        })
    }

    /// Create a sample from interleaved data (L, R, L, R, ... for stereo)
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
        format: PcmFormat,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(SampleError::UnsupportedFormat {
                format: "audio with zero channels".to_string(),
            });
        }
        if interleaved.len() % num_channels != 0 {
            return Err(SampleError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let frames = interleaved.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &value) in frame.iter().enumerate() {
                channels[ch].push(value);
            }
        }

        Self::new(channels, sample_rate, format)
    }

    /// Derive a new sample (fresh id) that keeps this sample's format
    pub(crate) fn derive(&self, channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        Self::new(channels, sample_rate, self.format)
    }

    /// Derive a new sample (fresh id) with an explicit format
    pub(crate) fn derive_with_format(
        &self,
        channels: Vec<Vec<f32>>,
        sample_rate: u32,
        format: PcmFormat,
    ) -> Result<Self> {
        Self::new(channels, sample_rate, format)
    }

    /// Copy of this sample's data under a new id
    pub fn duplicate(&self) -> Self {
        Self {
            id: SampleId::new(),
            ..self.clone()
        }
    }

    /// Convert the sample to interleaved order
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels.len() * self.frames());
        for frame in 0..self.frames() {
            for channel in &self.channels {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    #[inline]
    pub fn id(&self) -> SampleId {
        self.id
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Read-only access to one channel
    ///
    /// # Panics
    /// Panics if `index >= num_channels()`
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// All channels, non-interleaved
    #[inline]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Overall RMS level in dBFS across all channels
    pub fn rms_db(&self) -> f32 {
        let total = self.num_channels() * self.frames();
        if total == 0 {
            return f32::NEG_INFINITY;
        }
        let sum_squares: f64 = self
            .channels
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        linear_to_db((sum_squares / total as f64).sqrt() as f32)
    }

    /// Peak level in dBFS across all channels
    pub fn peak_db(&self) -> f32 {
        let peak = self
            .channels
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max);
        linear_to_db(peak)
    }
}

/// Samples compare by content; identity is ignored
impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate
            && self.format == other.format
            && self.channels == other.channels
    }
}

// ============================================================================
// Test Signals
// ============================================================================

/// Generate a mono sine wave at the given frequency
pub fn sine_wave(
    frequency: f32,
    duration_secs: f32,
    sample_rate: u32,
    amplitude: f32,
    format: PcmFormat,
) -> Result<Sample> {
    let frames = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    let data = (0..frames)
        .map(|i| amplitude * (angular_freq * i as f64).sin() as f32)
        .collect();
    Sample::new(vec![data], sample_rate, format)
}

/// Generate a stereo sine wave with a different frequency per channel
pub fn stereo_sine_wave(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
    format: PcmFormat,
) -> Result<Sample> {
    let left = sine_wave(freq_left, duration_secs, sample_rate, 0.5, format)?;
    let right = sine_wave(freq_right, duration_secs, sample_rate, 0.5, format)?;
    Sample::new(
        vec![left.channel(0).to_vec(), right.channel(0).to_vec()],
        sample_rate,
        format,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_creation() {
        let sample = Sample::new(vec![vec![0.0; 100]; 2], 44100, PcmFormat::Float32).unwrap();
        assert_eq!(sample.num_channels(), 2);
        assert_eq!(sample.frames(), 100);
        assert_eq!(sample.sample_rate(), 44100);
        assert!(!sample.is_empty());
    }

    #[test]
    fn test_rejects_ragged_channels() {
        let result = Sample::new(vec![vec![0.0; 10], vec![0.0; 9]], 48000, PcmFormat::Float32);
        assert!(matches!(result, Err(SampleError::InvalidAudio { .. })));
    }

    #[test]
    fn test_rejects_zero_channels_and_rate() {
        assert!(matches!(
            Sample::new(vec![], 48000, PcmFormat::Float32),
            Err(SampleError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            Sample::new(vec![vec![0.0]], 0, PcmFormat::Float32),
            Err(SampleError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_bit_depth() {
        assert!(PcmFormat::int(12).is_err());
        assert!(PcmFormat::int(24).is_ok());
        let result = Sample::new(vec![vec![0.0]], 48000, PcmFormat::Int { bits: 20 });
        assert!(matches!(result, Err(SampleError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_interleave_roundtrip() {
        let interleaved = vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0];
        let sample = Sample::from_interleaved(&interleaved, 2, 48000, PcmFormat::Float32).unwrap();
        assert_eq!(sample.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(sample.channel(1), &[5.0, 6.0, 7.0]);
        assert_eq!(sample.to_interleaved(), interleaved);
    }

    #[test]
    fn test_duplicate_changes_identity_not_content() {
        let sample = sine_wave(440.0, 0.01, 48000, 0.5, PcmFormat::Float32).unwrap();
        let copy = sample.duplicate();
        assert_ne!(sample.id(), copy.id());
        assert_eq!(sample, copy);
    }

    #[test]
    fn test_levels() {
        let sample = sine_wave(1000.0, 1.0, 48000, 1.0, PcmFormat::Float32).unwrap();
        // Full-scale sine: RMS is -3.01 dBFS, peak ~0 dBFS
        assert!((sample.rms_db() + 3.01).abs() < 0.05);
        assert!(sample.peak_db().abs() < 0.01);
    }

    #[test]
    fn test_full_scale() {
        assert_eq!(PcmFormat::Int { bits: 16 }.full_scale(), Some(32768.0));
        assert_eq!(PcmFormat::Int { bits: 8 }.full_scale(), Some(128.0));
        assert_eq!(PcmFormat::Float32.full_scale(), None);
    }
}
