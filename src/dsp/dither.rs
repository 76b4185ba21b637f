//! Output quantization
//!
//! Rounds processed audio onto the grid of the output bit depth, optionally
//! with TPDF dither (two uniform draws of ±½ LSB, summed). The dither source
//! is seeded so the same edit always renders the same bytes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::{PcmFormat, Sample};
use crate::error::Result;

/// Seed used for TPDF noise
pub const DITHER_SEED: u64 = 0x5A3D_17E1;

/// Quantize a sample to `format`
///
/// Float output is passed through unchanged. Integer output is rounded to
/// `k / 2^(bits-1)` and clamped to the representable range, so encoding it
/// afterwards is lossless.
pub fn quantize(sample: &Sample, format: PcmFormat, dither: bool) -> Result<Sample> {
    format.check()?;
    let Some(scale) = format.full_scale() else {
        return sample.derive_with_format(sample.channels().to_vec(), sample.sample_rate(), format);
    };

    let mut rng = StdRng::seed_from_u64(DITHER_SEED);
    let channels = sample
        .channels()
        .iter()
        .map(|channel| {
            channel
                .iter()
                .map(|&value| {
                    let noise = if dither {
                        rng.gen_range(-0.5..0.5) + rng.gen_range(-0.5..0.5)
                    } else {
                        0.0
                    };
                    let q = (value as f64 * scale + noise)
                        .round()
                        .clamp(-scale, scale - 1.0);
                    (q / scale) as f32
                })
                .collect()
        })
        .collect();

    sample.derive_with_format(channels, sample.sample_rate(), format)
}
