//! Phase-vocoder time stretching
//!
//! Changes duration without changing pitch. Each analysis frame is windowed
//! and transformed; per-bin phase advances are unwrapped into an
//! instantaneous frequency, which is then re-accumulated at the synthesis
//! hop. Frames are overlap-added and normalized by the summed squared
//! window, so a stretch factor of 1.0 reconstructs the input. Frames read
//! past either end are mirrored back into the input.
//!
//! Channels are stretched independently; inter-channel phase is not locked.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::dsp::kernel::reflect_index;
use crate::engine::Sample;
use crate::error::{Result, SampleError};

/// Largest stretch factor accepted (four octaves of repitch)
pub const MAX_STRETCH: f64 = 16.0;

/// Phase-vocoder framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    /// FFT frame size in frames (power of two)
    pub frame_size: usize,
    /// Synthesis hop in frames
    pub hop: usize,
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop: 512,
        }
    }
}

impl StretchConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.frame_size.is_power_of_two() || !(64..=65_536).contains(&self.frame_size) {
            return Err(SampleError::InvalidConfig {
                reason: format!(
                    "stretch frame_size {} must be a power of two in 64..=65536",
                    self.frame_size
                ),
            });
        }
        if self.hop == 0 || self.hop > self.frame_size / 4 {
            return Err(SampleError::InvalidConfig {
                reason: format!(
                    "stretch hop {} must be in 1..={} (a quarter frame or less)",
                    self.hop,
                    self.frame_size / 4
                ),
            });
        }
        Ok(())
    }
}

/// Time-stretch a sample by `factor` (2.0 doubles the duration)
///
/// Output frames: `round(frames * factor)`.
pub fn time_stretch(sample: &Sample, factor: f64, config: &StretchConfig) -> Result<Sample> {
    config.validate()?;
    if !factor.is_finite() || factor <= 0.0 || factor > MAX_STRETCH || factor < 1.0 / MAX_STRETCH {
        return Err(SampleError::InvalidRequest {
            reason: format!(
                "stretch factor {} outside {}..={}",
                factor,
                1.0 / MAX_STRETCH,
                MAX_STRETCH
            ),
        });
    }

    let out_frames = ((sample.frames() as f64) * factor).round() as usize;
    debug!(
        "Stretching {} frames by {:.4} -> {} frames",
        sample.frames(),
        factor,
        out_frames
    );

    let vocoder = PhaseVocoder::new(*config);
    let channels = sample
        .channels()
        .iter()
        .map(|input| vocoder.stretch(input, factor, out_frames))
        .collect();
    sample.derive(channels, sample.sample_rate())
}

/// Reusable STFT state for one frame size
struct PhaseVocoder {
    config: StretchConfig,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}

impl PhaseVocoder {
    fn new(config: StretchConfig) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let n = config.frame_size;
        let window = (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
            .collect();
        Self {
            config,
            forward: planner.plan_fft_forward(n),
            inverse: planner.plan_fft_inverse(n),
            window,
        }
    }

    fn stretch(&self, input: &[f32], factor: f64, out_frames: usize) -> Vec<f32> {
        if input.is_empty() {
            return vec![0.0; out_frames];
        }
        let n = self.config.frame_size;
        let half = n / 2;
        let synthesis_hop = self.config.hop;
        let analysis_hop = synthesis_hop as f64 / factor;
        let bins = half + 1;

        // Frames are centred on their hop position; the first one sits at 0
        let num_frames = out_frames.div_ceil(synthesis_hop) + 1;
        let mut output = vec![0.0f64; out_frames + n];
        let mut norm = vec![0.0f64; out_frames + n];

        let mut prev_phase = vec![0.0f64; bins];
        let mut synth_phase = vec![0.0f64; bins];
        let mut prev_pos = 0isize;
        let mut spectrum = vec![Complex::new(0.0f64, 0.0); n];

        for m in 0..num_frames {
            let pos = (m as f64 * analysis_hop).round() as isize;

            for (i, bin) in spectrum.iter_mut().enumerate() {
                let idx = reflect_index(pos - half as isize + i as isize, input.len());
                *bin = Complex::new(input[idx] as f64 * self.window[i], 0.0);
            }
            self.forward.process(&mut spectrum);

            let hop_in = (pos - prev_pos) as f64;
            for k in 0..bins {
                let magnitude = spectrum[k].norm();
                let phase = spectrum[k].arg();

                if m == 0 {
                    synth_phase[k] = phase;
                } else {
                    let omega = 2.0 * PI * k as f64 / n as f64;
                    let deviation = wrap_phase(phase - prev_phase[k] - omega * hop_in);
                    let inst_freq = if hop_in > 0.0 {
                        omega + deviation / hop_in
                    } else {
                        omega
                    };
                    synth_phase[k] += inst_freq * synthesis_hop as f64;
                }
                prev_phase[k] = phase;
                spectrum[k] = Complex::from_polar(magnitude, synth_phase[k]);
            }
            // Mirror for a real-valued inverse
            for k in 1..half {
                spectrum[n - k] = spectrum[k].conj();
            }
            self.inverse.process(&mut spectrum);
            prev_pos = pos;

            // Output frame m is centred on m * synthesis_hop; offset by half a
            // frame so its left edge lands at index 0 for m = 0.
            let out_start = m * synthesis_hop;
            for i in 0..n {
                let w = self.window[i];
                let value = spectrum[i].re / n as f64;
                if let Some(slot) = output.get_mut(out_start + i) {
                    *slot += value * w;
                    norm[out_start + i] += w * w;
                }
            }
        }

        // Undo the half-frame offset and normalize by the window overlap
        (0..out_frames)
            .map(|i| {
                let j = i + half;
                if norm[j] > 1e-6 {
                    (output[j] / norm[j]) as f32
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Wrap a phase into `[-pi, pi)`
#[inline]
fn wrap_phase(phase: f64) -> f64 {
    (phase + PI).rem_euclid(2.0 * PI) - PI
}
