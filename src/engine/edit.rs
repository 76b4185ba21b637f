//! Edit pipeline
//!
//! One `EditRequest` applied to one source `Sample`:
//!
//! 1. pick the region (whole sample when none is given)
//! 2. trim; a loop keeps its pre-roll or post-roll attached
//! 3. repitch
//! 4. convert the sample rate
//! 5. loop: blend the seam at the new length
//! 6. apply the rate multiplier to the sample-rate tag
//! 7. quantize to the output format
//!
//! Blending the seam after retiming means the frames that wrap are neighbours
//! in the retimed signal, whatever the repitch mode. The source is never
//! modified. The result carries the new sample, its loop
//! point and a provenance record.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::dsp::dither::quantize;
use crate::dsp::pitch::{check_semitones, repitch, RepitchMode};
use crate::dsp::region::{
    define_loop, define_region, define_region_normalized, seam_source, trim, LoopPoint, Region,
    SeamSource,
};
use crate::dsp::resample::{check_rate, resample};
use crate::dsp::seam::build_seamless_loop;
use crate::engine::sample::{PcmFormat, Sample, SampleId};
use crate::error::{Result, SampleError};

/// Version recorded in provenance
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rate multiplier range (half to double speed)
pub const MIN_RATE_MULTIPLIER: f64 = 0.5;
pub const MAX_RATE_MULTIPLIER: f64 = 2.0;

/// Region selection in an edit request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionSpec {
    /// Frame indices, `[start, end)`
    Frames { start: usize, end: usize },
    /// Positions in `[0, 1]` of the sample length
    Normalized { start: f64, end: f64 },
}

impl RegionSpec {
    /// Resolve against a sample
    pub fn resolve(&self, sample: &Sample) -> Result<Region> {
        match *self {
            RegionSpec::Frames { start, end } => define_region(sample, start, end),
            RegionSpec::Normalized { start, end } => define_region_normalized(sample, start, end),
        }
    }
}

/// Loop settings; present on a request means looping is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Crossfade length; when absent, derived from the region length
    pub crossfade_frames: Option<usize>,
}

/// What to do to a sample
///
/// Fields left as `None` fall back to the source sample or to the editor's
/// configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditRequest {
    pub region: Option<RegionSpec>,
    pub semitones: f64,
    pub target_sample_rate: Option<u32>,
    pub loop_settings: Option<LoopSettings>,
    pub repitch_mode: Option<RepitchMode>,
    pub output_format: Option<PcmFormat>,
    pub dither: Option<bool>,
    /// Scales the sample-rate tag without touching the frames, so playback
    /// speed and pitch change together
    pub rate_multiplier: Option<f64>,
}

impl EditRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, start: usize, end: usize) -> Self {
        self.region = Some(RegionSpec::Frames { start, end });
        self
    }

    pub fn with_normalized_region(mut self, start: f64, end: f64) -> Self {
        self.region = Some(RegionSpec::Normalized { start, end });
        self
    }

    pub fn with_semitones(mut self, semitones: f64) -> Self {
        self.semitones = semitones;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }

    pub fn with_loop(mut self, crossfade_frames: Option<usize>) -> Self {
        self.loop_settings = Some(LoopSettings { crossfade_frames });
        self
    }

    pub fn with_repitch_mode(mut self, mode: RepitchMode) -> Self {
        self.repitch_mode = Some(mode);
        self
    }

    pub fn with_output_format(mut self, format: PcmFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_dither(mut self, dither: bool) -> Self {
        self.dither = Some(dither);
        self
    }

    pub fn with_rate_multiplier(mut self, multiplier: f64) -> Self {
        self.rate_multiplier = Some(multiplier);
        self
    }

    /// Checks that don't need the sample
    pub fn validate(&self) -> Result<()> {
        check_semitones(self.semitones)?;
        if let Some(rate) = self.target_sample_rate {
            check_rate(rate)?;
        }
        if let Some(multiplier) = self.rate_multiplier {
            if !(MIN_RATE_MULTIPLIER..=MAX_RATE_MULTIPLIER).contains(&multiplier) {
                return Err(SampleError::InvalidRequest {
                    reason: format!(
                        "rate multiplier {} outside {}..={}",
                        multiplier, MIN_RATE_MULTIPLIER, MAX_RATE_MULTIPLIER
                    ),
                });
            }
        }
        if let Some(format) = self.output_format {
            format.check()?;
        }
        Ok(())
    }
}

/// Where an edit came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_id: SampleId,
    pub request: EditRequest,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
}

/// Output of one edit
#[derive(Debug, Clone)]
pub struct EditResult {
    sample: Sample,
    loop_point: Option<LoopPoint>,
    provenance: Provenance,
}

impl EditResult {
    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    /// Loop over the new sample, when the request asked for one
    pub fn loop_point(&self) -> Option<&LoopPoint> {
        self.loop_point.as_ref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn into_sample(self) -> Sample {
        self.sample
    }
}

/// Run an edit against a sample
///
/// # Errors
/// * `EmptySample` - the source has no frames
/// * `InvalidRange` / `InvalidCrossfade` - region or loop doesn't fit
/// * `InvalidRequest` - pitch shift, target rate or rate multiplier out of range
/// * `UnsupportedFormat` - output format can't be written
pub fn apply_edit(source: &Sample, request: &EditRequest, config: &EditorConfig) -> Result<EditResult> {
    if source.is_empty() {
        return Err(SampleError::EmptySample);
    }
    request.validate()?;

    let region = match &request.region {
        Some(spec) => spec.resolve(source)?,
        None => Region::whole(source)?,
    };

    let mode = request.repitch_mode.unwrap_or(config.repitch_mode);
    let (rendered, crossfade) = match request.loop_settings {
        Some(settings) => {
            let crossfade = settings
                .crossfade_frames
                .unwrap_or_else(|| config.crossfade.frames_for(region.len()));
            let loop_point = define_loop(source, &region, crossfade)?;
            let seam = seam_source(source, &loop_point)?;
            debug!(
                "Loop {}..{} ({} frame crossfade from the {:?})",
                loop_point.loop_start(),
                loop_point.loop_end(),
                crossfade,
                seam
            );

            let span = match seam {
                SeamSource::PreRoll => define_region(source, region.start() - crossfade, region.end())?,
                SeamSource::PostRoll => define_region(source, region.start(), region.end() + crossfade)?,
            };
            let retimed = retime(&trim(source, &span)?, request, mode, config)?;

            // The seam frames scale with everything else
            let scale = retimed.frames() as f64 / span.len() as f64;
            let fade = ((crossfade as f64 * scale).round() as usize).min(retimed.frames() / 2);
            let body = match seam {
                SeamSource::PreRoll => define_region(&retimed, fade, retimed.frames())?,
                SeamSource::PostRoll => define_region(&retimed, 0, retimed.frames() - fade)?,
            };
            let looped = build_seamless_loop(&retimed, &define_loop(&retimed, &body, fade)?)?;
            (looped, Some(fade))
        }
        None => (retime(&trim(source, &region)?, request, mode, config)?, None),
    };

    let rendered = match request.rate_multiplier {
        Some(multiplier) => retag_rate(&rendered, multiplier)?,
        None => rendered,
    };

    let format = request.output_format.unwrap_or(source.format());
    let dither = request.dither.unwrap_or(config.dither);
    let sample = quantize(&rendered, format, dither)?;
    if sample.is_empty() {
        return Err(SampleError::EmptySample);
    }
    let loop_point = crossfade.map(|fade| LoopPoint::spanning(sample.frames(), fade));

    info!(
        "Edited sample {}: {} -> {} frames, {} Hz, {}",
        source.id(),
        source.frames(),
        sample.frames(),
        sample.sample_rate(),
        sample.format()
    );

    Ok(EditResult {
        sample,
        loop_point,
        provenance: Provenance {
            source_id: source.id(),
            request: request.clone(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
        },
    })
}

/// Repitch then convert the rate
fn retime(
    sample: &Sample,
    request: &EditRequest,
    mode: RepitchMode,
    config: &EditorConfig,
) -> Result<Sample> {
    let pitched = repitch(
        sample,
        request.semitones,
        mode,
        &config.resampler,
        &config.stretch,
    )?;
    match request.target_sample_rate {
        Some(rate) => resample(&pitched, rate, &config.resampler),
        None => Ok(pitched),
    }
}

/// Same frames under a scaled sample-rate tag
fn retag_rate(sample: &Sample, multiplier: f64) -> Result<Sample> {
    let rate = (sample.sample_rate() as f64 * multiplier).round() as u32;
    check_rate(rate)?;
    debug!("Retagging {} Hz -> {} Hz (x{})", sample.sample_rate(), rate, multiplier);
    sample.derive(sample.channels().to_vec(), rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::pitch::pitch_ratio;
    use crate::engine::sample::{sine_wave, stereo_sine_wave};
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    /// 16-bit tone already on the 16-bit grid, as if decoded from disk
    fn tone() -> Sample {
        let raw = sine_wave(440.0, 1.0, 48000, 0.5, PcmFormat::Float32).unwrap();
        quantize(&raw, PcmFormat::Int { bits: 16 }, false).unwrap()
    }

    #[test]
    fn test_empty_request_is_identity() {
        let source = tone();
        let result = apply_edit(&source, &EditRequest::new(), &EditorConfig::default()).unwrap();

        assert_eq!(result.sample(), &source);
        assert_ne!(result.sample().id(), source.id());
        assert!(result.loop_point().is_none());
        assert_eq!(result.provenance().source_id, source.id());
        assert_eq!(result.provenance().engine_version, ENGINE_VERSION);
    }

    #[test]
    fn test_trim_region() {
        let source = tone();
        let request = EditRequest::new().with_region(1000, 5000);
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();

        assert_eq!(result.sample().frames(), 4000);
        assert_eq!(result.sample().channel(0), &source.channel(0)[1000..5000]);
    }

    #[test]
    fn test_normalized_region() {
        let source = tone();
        let request = EditRequest::new().with_normalized_region(0.5, 1.0);
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();
        assert_eq!(result.sample().frames(), 24000);
    }

    #[test]
    fn test_loop_with_default_crossfade() {
        let source = tone();
        let request = EditRequest::new().with_region(2000, 12000).with_loop(None);
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();

        let loop_point = result.loop_point().unwrap();
        assert_eq!(loop_point.loop_start(), 0);
        assert_eq!(loop_point.loop_end(), 10000);
        assert_eq!(loop_point.crossfade_frames(), 1000);
        assert_eq!(result.sample().frames(), 10000);
    }

    #[test]
    fn test_loop_near_start_keeps_region() {
        let source = tone();
        let request = EditRequest::new()
            .with_region(100, 20000)
            .with_loop(Some(500));
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();
        // The seam borrows the frames after the region instead of moving its start
        assert_eq!(result.sample().frames(), 19900);
        assert_eq!(&result.sample().channel(0)[500..], &source.channel(0)[600..20000]);
    }

    #[test]
    fn test_loop_without_room_fails() {
        let source = tone();
        let request = EditRequest::new().with_loop(Some(500));
        assert!(matches!(
            apply_edit(&source, &request, &EditorConfig::default()),
            Err(SampleError::InvalidCrossfade { .. })
        ));
    }

    #[test]
    fn test_crossfade_longer_than_region_fails() {
        let source = tone();
        let request = EditRequest::new().with_region(0, 100).with_loop(Some(200));
        assert!(matches!(
            apply_edit(&source, &request, &EditorConfig::default()),
            Err(SampleError::InvalidCrossfade { .. })
        ));
    }

    #[test]
    fn test_loop_crossfade_scales_with_repitch() {
        let source = tone();
        let request = EditRequest::new()
            .with_region(4000, 24000)
            .with_loop(Some(1000))
            .with_semitones(12.0);
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();

        assert_eq!(result.sample().frames(), 10000);
        assert_eq!(result.loop_point().unwrap().crossfade_frames(), 500);
    }

    #[test]
    fn test_repitched_loop_wraps_smoothly() {
        let source = tone();
        for semitones in [1.0, 7.0, -5.0] {
            let request = EditRequest::new()
                .with_region(4000, 40000)
                .with_loop(Some(1000))
                .with_semitones(semitones);
            let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();

            let data = result.sample().channel(0);
            let freq = 440.0 * pitch_ratio(semitones);
            let max_step = (0.5 * 2.0 * std::f64::consts::PI * freq / 48000.0) as f32;
            let wrap = (data[data.len() - 1] - data[0]).abs();
            assert!(wrap <= max_step * 1.1, "{} st: wrap {} > {}", semitones, wrap, max_step);
        }
    }

    #[test]
    fn test_rate_multiplier_retags_without_resampling() {
        let source = tone();
        let request = EditRequest::new()
            .with_region(0, 12000)
            .with_rate_multiplier(1.5);
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();

        assert_eq!(result.sample().sample_rate(), 72000);
        assert_eq!(result.sample().channel(0), &source.channel(0)[..12000]);
        assert_abs_diff_eq!(result.sample().duration_secs(), 12000.0 / 72000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rate_multiplier_applies_after_resampling() {
        let source = tone();
        let request = EditRequest::new()
            .with_sample_rate(44100)
            .with_rate_multiplier(0.5);
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();
        assert_eq!(result.sample().frames(), 44100);
        assert_eq!(result.sample().sample_rate(), 22050);
    }

    #[test]
    fn test_rate_multiplier_out_of_range() {
        for multiplier in [0.25, 2.5, f64::NAN] {
            let request = EditRequest::new().with_rate_multiplier(multiplier);
            assert!(matches!(
                request.validate(),
                Err(SampleError::InvalidRequest { .. })
            ));
        }
    }

    #[test]
    fn test_resample_and_format_override() {
        let source = stereo_sine_wave(440.0, 660.0, 0.5, 48000, PcmFormat::Int { bits: 24 }).unwrap();
        let request = EditRequest::new()
            .with_sample_rate(44100)
            .with_output_format(PcmFormat::Int { bits: 16 })
            .with_dither(true);
        let result = apply_edit(&source, &request, &EditorConfig::default()).unwrap();

        let sample = result.sample();
        assert_eq!(sample.sample_rate(), 44100);
        assert_eq!(sample.frames(), 22050);
        assert_eq!(sample.num_channels(), 2);
        assert_eq!(sample.format(), PcmFormat::Int { bits: 16 });
        assert_abs_diff_eq!(sample.duration_secs(), 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_invalid_requests_rejected_before_work() {
        let source = tone();
        let config = EditorConfig::default();

        let bad_pitch = EditRequest::new().with_semitones(f64::NAN);
        assert!(matches!(
            apply_edit(&source, &bad_pitch, &config),
            Err(SampleError::InvalidRequest { .. })
        ));

        let bad_rate = EditRequest::new().with_sample_rate(10);
        assert!(matches!(
            apply_edit(&source, &bad_rate, &config),
            Err(SampleError::InvalidRequest { .. })
        ));

        let bad_format = EditRequest::new().with_output_format(PcmFormat::Int { bits: 12 });
        assert!(matches!(
            apply_edit(&source, &bad_format, &config),
            Err(SampleError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_empty_source_rejected() {
        let empty = Sample::new(vec![Vec::new()], 48000, PcmFormat::Float32).unwrap();
        assert!(matches!(
            apply_edit(&empty, &EditRequest::new(), &EditorConfig::default()),
            Err(SampleError::EmptySample)
        ));
    }

    #[test]
    fn test_request_json_round_trip() {
        let request = EditRequest::new()
            .with_normalized_region(0.1, 0.9)
            .with_loop(Some(256))
            .with_semitones(-3.5)
            .with_repitch_mode(RepitchMode::PreserveDuration)
            .with_output_format(PcmFormat::Float32);
        let json = serde_json::to_string(&request).unwrap();
        let parsed: EditRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);

        // Everything is optional in a preset
        let minimal: EditRequest = serde_json::from_str(r#"{ "semitones": 2.0 }"#).unwrap();
        assert_eq!(minimal, EditRequest::new().with_semitones(2.0));
    }
}
