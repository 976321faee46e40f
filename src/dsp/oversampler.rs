//! Upsampling stage that raises coupled signals to the working rate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OversamplingFactor {
    #[serde(rename = "1x")]
    X1,
    #[serde(rename = "2x")]
    X2,
    #[serde(rename = "3x")]
    X3,
    #[serde(rename = "4x")]
    X4,
    #[serde(rename = "6x")]
    X6,
    #[default]
    #[serde(rename = "8x")]
    X8,
}

impl OversamplingFactor {
    pub const ALL: [Self; 6] = [Self::X1, Self::X2, Self::X3, Self::X4, Self::X6, Self::X8];

    pub const fn ratio(self) -> usize {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X3 => 3,
            Self::X4 => 4,
            Self::X6 => 6,
            Self::X8 => 8,
        }
    }
}

/// Pluggable upsampler. Implementations may carry a fixed latency; callers ignore it.
pub trait Oversampler {
    fn set_factor(&mut self, factor: OversamplingFactor);
    /// Writes exactly `src.len() * ratio` samples to the head of `dst`.
    fn upsample(&mut self, dst: &mut [f32], src: &[f32]);
}

/// Linear-interpolating upsampler with one input sample of latency above 1x.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinearOversampler {
    factor: OversamplingFactor,
    #[serde(skip)]
    last: f32,
}

impl LinearOversampler {
    pub fn new(factor: OversamplingFactor) -> Self {
        Self { factor, last: 0.0 }
    }
}

impl Oversampler for LinearOversampler {
    fn set_factor(&mut self, factor: OversamplingFactor) {
        self.factor = factor;
    }

    fn upsample(&mut self, dst: &mut [f32], src: &[f32]) {
        let ratio = self.factor.ratio();
        debug_assert!(dst.len() >= src.len() * ratio);
        let step = 1.0 / ratio as f32;
        for (frame, &x) in dst.chunks_exact_mut(ratio).zip(src) {
            let delta = x - self.last;
            for (k, out) in frame.iter_mut().enumerate() {
                *out = self.last + delta * (k + 1) as f32 * step;
            }
            self.last = x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_factor_copies_input() {
        let mut over = LinearOversampler::new(OversamplingFactor::X1);
        let src = [0.25, -0.5, 1.0];
        let mut dst = [0.0; 3];
        over.upsample(&mut dst, &src);
        assert_eq!(dst, src);
    }

    #[test]
    fn output_length_tracks_ratio() {
        for factor in OversamplingFactor::ALL {
            let mut over = LinearOversampler::new(factor);
            let src = [1.0; 5];
            let mut dst = vec![f32::NAN; 5 * factor.ratio() + 1];
            over.upsample(&mut dst, &src);
            assert!(dst[..5 * factor.ratio()].iter().all(|v| v.is_finite()));
            assert!(dst[5 * factor.ratio()].is_nan(), "{factor:?} wrote past its span");
        }
    }

    #[test]
    fn interpolates_between_inputs() {
        let mut over = LinearOversampler::new(OversamplingFactor::X4);
        let mut dst = [0.0; 8];
        over.upsample(&mut dst, &[1.0, 1.0]);
        assert_eq!(dst, [0.25, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0, 1.0]);
    }
}
