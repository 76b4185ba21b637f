//! Seamless loop construction
//!
//! Renders the loop body `[loop_start, loop_end)` with its seam blended
//! against the frames outside it using an equal-power curve.
//!
//! With a pre-roll, the last `crossfade_frames` frames fade into the frames
//! just before `loop_start`; the final rendered frame equals
//! `source[loop_start - 1]`, so wrapping to the first frame
//! (`source[loop_start]`) continues the original signal.
//!
//! With a post-roll, the first `crossfade_frames` frames fade out of the
//! frames just after `loop_end`; the first rendered frame equals
//! `source[loop_end]`, which continues from the untouched last frame
//! `source[loop_end - 1]`.

use std::f64::consts::FRAC_PI_2;

use log::debug;

use crate::dsp::region::{define_loop, define_region, seam_source, LoopPoint, SeamSource};
use crate::engine::Sample;
use crate::error::Result;

/// Equal-power gains `(fade_out, fade_in)` at crossfade position `t` in `[0, 1]`
#[inline]
pub fn equal_power_gains(t: f64) -> (f64, f64) {
    let theta = t.clamp(0.0, 1.0) * FRAC_PI_2;
    (theta.cos(), theta.sin())
}

/// Render a loop body with its seam crossfaded
///
/// The loop point is re-validated against `sample` so a `LoopPoint` from a
/// different sample can't index out of bounds.
pub fn build_seamless_loop(sample: &Sample, loop_point: &LoopPoint) -> Result<Sample> {
    let region = define_region(sample, loop_point.loop_start(), loop_point.loop_end())?;
    let checked = define_loop(sample, &region, loop_point.crossfade_frames())?;
    let seam = seam_source(sample, &checked)?;

    let start = checked.loop_start();
    let end = checked.loop_end();
    let fade = checked.crossfade_frames();

    let channels = sample
        .channels()
        .iter()
        .map(|source| {
            let mut body = source[start..end].to_vec();
            match seam {
                SeamSource::PreRoll => {
                    let tail_offset = body.len() - fade;
                    for i in 0..fade {
                        let t = (i + 1) as f64 / fade as f64;
                        let (out_gain, in_gain) = equal_power_gains(t);
                        let tail = body[tail_offset + i] as f64;
                        let preroll = source[start - fade + i] as f64;
                        body[tail_offset + i] = (tail * out_gain + preroll * in_gain) as f32;
                    }
                }
                SeamSource::PostRoll => {
                    for (i, frame) in body.iter_mut().take(fade).enumerate() {
                        let t = i as f64 / fade as f64;
                        let (out_gain, in_gain) = equal_power_gains(t);
                        let postroll = source[end + i] as f64;
                        *frame = (postroll * out_gain + *frame as f64 * in_gain) as f32;
                    }
                }
            }
            body
        })
        .collect();

    debug!(
        "Built seamless loop {}..{} with {} frame crossfade from the {:?}",
        start, end, fade, seam
    );

    sample.derive(channels, sample.sample_rate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sample::sine_wave;
    use crate::engine::PcmFormat;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_equal_power_gains() {
        let (out0, in0) = equal_power_gains(0.0);
        assert_abs_diff_eq!(out0, 1.0);
        assert_abs_diff_eq!(in0, 0.0);

        // Power stays constant across the fade
        for step in 0..=10 {
            let (g_out, g_in) = equal_power_gains(step as f64 / 10.0);
            assert_abs_diff_eq!(g_out * g_out + g_in * g_in, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_loop_boundary_is_continuous() {
        // 437 Hz does not divide the region evenly, so a hard loop would click
        let sample = sine_wave(437.0, 1.0, 48000, 0.8, PcmFormat::Float32).unwrap();
        let region = define_region(&sample, 4000, 40_000).unwrap();
        let lp = define_loop(&sample, &region, 1000).unwrap();

        let body = build_seamless_loop(&sample, &lp).unwrap();
        assert_eq!(body.frames(), 36_000);

        let data = body.channel(0);
        let jump = (data[data.len() - 1] - data[0]).abs();
        // Largest step a 437 Hz sine at 0.8 can take between two frames
        let max_slope = 0.8 * 2.0 * std::f32::consts::PI * 437.0 / 48000.0;
        assert!(jump <= max_slope + 1e-4, "seam jump {} > {}", jump, max_slope);

        let hard_jump = (sample.channel(0)[39_999] - sample.channel(0)[4000]).abs();
        assert!(hard_jump > jump);
    }

    #[test]
    fn test_last_frame_matches_preroll() {
        let sample = sine_wave(300.0, 0.5, 48000, 0.5, PcmFormat::Float32).unwrap();
        let region = define_region(&sample, 2000, 20_000).unwrap();
        let lp = define_loop(&sample, &region, 256).unwrap();
        let body = build_seamless_loop(&sample, &lp).unwrap();

        let last = body.channel(0)[body.frames() - 1];
        assert_abs_diff_eq!(last, sample.channel(0)[1999], epsilon = 1e-6);
    }

    #[test]
    fn test_frames_before_fade_untouched() {
        let sample = sine_wave(300.0, 0.5, 48000, 0.5, PcmFormat::Float32).unwrap();
        let region = define_region(&sample, 1000, 10_000).unwrap();
        let lp = define_loop(&sample, &region, 500).unwrap();
        let body = build_seamless_loop(&sample, &lp).unwrap();

        assert_eq!(&body.channel(0)[..8500], &sample.channel(0)[1000..9500]);
    }

    #[test]
    fn test_postroll_loop_from_sample_start() {
        let sample = sine_wave(437.0, 1.0, 48000, 0.8, PcmFormat::Float32).unwrap();
        let region = define_region(&sample, 0, 36_000).unwrap();
        let lp = define_loop(&sample, &region, 1000).unwrap();
        let body = build_seamless_loop(&sample, &lp).unwrap();
        assert_eq!(body.frames(), 36_000);

        let data = body.channel(0);
        assert_abs_diff_eq!(data[0], sample.channel(0)[36_000], epsilon = 1e-6);
        // Frames after the fade and the last frame are untouched
        assert_eq!(&data[1000..], &sample.channel(0)[1000..36_000]);

        let jump = (data[data.len() - 1] - data[0]).abs();
        let max_slope = 0.8 * 2.0 * std::f32::consts::PI * 437.0 / 48000.0;
        assert!(jump <= max_slope + 1e-4, "seam jump {} > {}", jump, max_slope);
    }

    #[test]
    fn test_zero_crossfade_is_plain_copy() {
        let sample = sine_wave(300.0, 0.1, 48000, 0.5, PcmFormat::Float32).unwrap();
        let region = define_region(&sample, 100, 2000).unwrap();
        let lp = define_loop(&sample, &region, 0).unwrap();
        let body = build_seamless_loop(&sample, &lp).unwrap();
        assert_eq!(body.channel(0), &sample.channel(0)[100..2000]);
    }
}
