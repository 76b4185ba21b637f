//! Windowed-sinc interpolation kernel

use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};

/// Window applied to the sinc kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Blackman: ~-58 dB sidelobes, wider main lobe
    #[default]
    Blackman,
    /// Hann: narrower transition band, ~-31 dB sidelobes
    Hann,
}

/// Normalized sinc: `sin(pi x) / (pi x)`, with `sinc(0) = 1`
#[inline]
pub fn sinc<T: Float + FloatConst>(x: T) -> T {
    if x.abs() < T::epsilon() {
        T::one()
    } else {
        let px = T::PI() * x;
        px.sin() / px
    }
}

/// Window value at offset `x` for a kernel spanning `[-half_width, half_width]`
///
/// Zero outside the span.
#[inline]
pub fn window<T: Float + FloatConst>(kind: WindowKind, x: T, half_width: T) -> T {
    if x.abs() > half_width {
        return T::zero();
    }
    let two = T::one() + T::one();
    // Phase runs 0 at the centre to pi at the edges
    let phase = T::PI() * x / half_width;
    match kind {
        WindowKind::Blackman => {
            let a0 = T::from(0.42).unwrap_or_else(T::zero);
            let a1 = T::from(0.5).unwrap_or_else(T::zero);
            let a2 = T::from(0.08).unwrap_or_else(T::zero);
            a0 + a1 * phase.cos() + a2 * (two * phase).cos()
        }
        WindowKind::Hann => (T::one() + phase.cos()) / two,
    }
}

/// Low-pass interpolation kernel
///
/// `cutoff` is the pass band relative to the input Nyquist (1.0 = full
/// band). Lowering it widens the kernel in input samples so the number of
/// zero crossings stays `zero_crossings` on each side.
#[derive(Debug, Clone, Copy)]
pub struct SincKernel {
    cutoff: f64,
    zero_crossings: usize,
    window: WindowKind,
    /// Support radius in input samples
    radius: f64,
}

impl SincKernel {
    pub fn new(cutoff: f64, zero_crossings: usize, window: WindowKind) -> Self {
        let cutoff = cutoff.clamp(f64::EPSILON, 1.0);
        Self {
            cutoff,
            zero_crossings,
            window,
            radius: zero_crossings as f64 / cutoff,
        }
    }

    /// Support radius in input samples
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    #[inline]
    pub fn zero_crossings(&self) -> usize {
        self.zero_crossings
    }

    /// Kernel weight at distance `x` (in input samples) from the read position
    #[inline]
    pub fn weight(&self, x: f64) -> f64 {
        self.cutoff * sinc(self.cutoff * x) * window(self.window, x, self.radius)
    }

    /// Interpolate `input` at fractional position `pos`
    ///
    /// Frames outside the input are mirrored back in (see [`reflect_index`]),
    /// so the full kernel always applies and the edges carry no step into
    /// silence. Weights are normalized by their sum so DC passes at unity
    /// regardless of the fractional offset.
    pub fn interpolate(&self, input: &[f32], pos: f64) -> f32 {
        if input.is_empty() {
            return 0.0;
        }
        let first = (pos - self.radius).ceil() as isize;
        let last = (pos + self.radius).floor() as isize;

        let mut acc = 0.0f64;
        let mut norm = 0.0f64;
        for k in first..=last {
            let w = self.weight(pos - k as f64);
            acc += input[reflect_index(k, input.len())] as f64 * w;
            norm += w;
        }

        if norm.abs() > 1e-9 {
            (acc / norm) as f32
        } else {
            acc as f32
        }
    }
}

/// Map any index onto `[0, len)` by mirroring about the first and last frame
///
/// `-1` reads frame 1 and `len` reads frame `len - 2`. Indices further out
/// keep folding, so kernels wider than the input stay in bounds. `len` must
/// be non-zero.
#[inline]
pub(crate) fn reflect_index(k: isize, len: usize) -> usize {
    if len < 2 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = k.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - folded) as usize
    }
}
