//! Region Editor
//!
//! Trim regions and loop points over a sample, validated against its length.

use serde::Serialize;

use crate::engine::Sample;
use crate::error::{Result, SampleError};

/// Longest crossfade picked when the caller doesn't give one
pub const MAX_DEFAULT_CROSSFADE: usize = 1000;

/// Share of the region used for the default crossfade (1/10)
pub const DEFAULT_CROSSFADE_DIVISOR: usize = 10;

/// Half-open frame range `[start, end)` over a sample
///
/// Invariant: `0 <= start < end <= length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    start: usize,
    end: usize,
}

impl Region {
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of frames in the region (never zero)
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The region covering a whole sample
    pub fn whole(sample: &Sample) -> Result<Region> {
        define_region(sample, 0, sample.frames())
    }
}

/// Loop points with the crossfade applied at the seam
///
/// Invariant: `loop_end - loop_start >= crossfade_frames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopPoint {
    loop_start: usize,
    loop_end: usize,
    crossfade_frames: usize,
}

impl LoopPoint {
    #[inline]
    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    #[inline]
    pub fn loop_end(&self) -> usize {
        self.loop_end
    }

    #[inline]
    pub fn crossfade_frames(&self) -> usize {
        self.crossfade_frames
    }

    /// Length of the loop body in frames
    #[inline]
    pub fn len(&self) -> usize {
        self.loop_end - self.loop_start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loop spanning a whole rendered loop body, with the seam already baked in
    pub(crate) fn spanning(frames: usize, crossfade_frames: usize) -> LoopPoint {
        LoopPoint {
            loop_start: 0,
            loop_end: frames,
            crossfade_frames: crossfade_frames.min(frames),
        }
    }
}

/// Validate a trim region against a sample
///
/// # Errors
/// * `InvalidRange` - `start >= end` or `end > length`
pub fn define_region(sample: &Sample, start: usize, end: usize) -> Result<Region> {
    let length = sample.frames();
    if start >= end {
        return Err(SampleError::InvalidRange {
            reason: format!("start {} is not before end {}", start, end),
        });
    }
    if end > length {
        return Err(SampleError::InvalidRange {
            reason: format!("end {} is past the sample length {}", end, length),
        });
    }
    Ok(Region { start, end })
}

/// Build a region from normalized positions in `[0, 1]`
///
/// Positions map to `floor(pos * length)`.
pub fn define_region_normalized(sample: &Sample, start_pos: f64, end_pos: f64) -> Result<Region> {
    for (name, pos) in [("start", start_pos), ("end", end_pos)] {
        if !pos.is_finite() || !(0.0..=1.0).contains(&pos) {
            return Err(SampleError::InvalidRange {
                reason: format!("{} position {} is outside [0, 1]", name, pos),
            });
        }
    }
    let length = sample.frames() as f64;
    let start = (start_pos * length).floor() as usize;
    let end = (end_pos * length).floor() as usize;
    define_region(sample, start, end)
}

/// Copy the frames of a region into a new sample
pub fn trim(sample: &Sample, region: &Region) -> Result<Sample> {
    if region.end > sample.frames() {
        return Err(SampleError::InvalidRange {
            reason: format!(
                "region {}..{} does not fit a sample of {} frames",
                region.start,
                region.end,
                sample.frames()
            ),
        });
    }
    let channels = sample
        .channels()
        .iter()
        .map(|channel| channel[region.start..region.end].to_vec())
        .collect();
    sample.derive(channels, sample.sample_rate())
}

/// Default crossfade for a loop region: a tenth of it, capped at 1000 frames
pub fn default_crossfade(region_len: usize) -> usize {
    (region_len / DEFAULT_CROSSFADE_DIVISOR).min(MAX_DEFAULT_CROSSFADE)
}

/// Where the frames blended into the seam come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeamSource {
    /// The frames just before the loop start, blended into the loop tail
    PreRoll,
    /// The frames just after the loop end, blended into the loop head
    PostRoll,
}

/// Pick the seam source for a loop, preferring the pre-roll
///
/// # Errors
/// * `InvalidCrossfade` - neither `crossfade_frames` frames before the loop
///   start nor after its end exist in the sample
pub fn seam_source(sample: &Sample, loop_point: &LoopPoint) -> Result<SeamSource> {
    let fade = loop_point.crossfade_frames;
    if loop_point.loop_start >= fade {
        return Ok(SeamSource::PreRoll);
    }
    let after = sample.frames().saturating_sub(loop_point.loop_end);
    if after >= fade {
        return Ok(SeamSource::PostRoll);
    }
    Err(SampleError::InvalidCrossfade {
        crossfade_frames: fade,
        reason: format!(
            "loop {}..{} of a {} frame sample has no room for the seam: \
             start at frame {} or later, or end at frame {} or earlier",
            loop_point.loop_start,
            loop_point.loop_end,
            sample.frames(),
            fade,
            sample.frames().saturating_sub(fade)
        ),
    })
}

/// Define a loop over a region with a crossfade of `crossfade_frames`
///
/// The loop covers the region exactly. Its seam blends against frames
/// outside the region: the pre-roll when the region starts at least
/// `crossfade_frames` into the sample, otherwise the post-roll after its end.
///
/// # Errors
/// * `InvalidRange` - the region does not fit the sample
/// * `InvalidCrossfade` - the crossfade is longer than the region, or the
///   sample has no room for it on either side of the region
pub fn define_loop(sample: &Sample, region: &Region, crossfade_frames: usize) -> Result<LoopPoint> {
    let region = define_region(sample, region.start, region.end)?;

    if crossfade_frames > region.len() {
        return Err(SampleError::InvalidCrossfade {
            crossfade_frames,
            reason: format!("exceeds region length {}", region.len()),
        });
    }

    let loop_point = LoopPoint {
        loop_start: region.start,
        loop_end: region.end,
        crossfade_frames,
    };
    seam_source(sample, &loop_point)?;
    Ok(loop_point)
}
