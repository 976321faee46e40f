//! One-pole, one-zero DC blocking filter used for AC coupling.

use super::{Reconfigurable, SampleProcessor};
use serde::Serialize;

pub const DC_BLOCK_CUTOFF_HZ: f64 = 5.0;
pub const DEFAULT_POLE: f32 = 0.999;

// 10^(3/10): places the -3 dB point of the section exactly at the cutoff.
const HALF_POWER_GAIN: f64 = 1.995_262_314_968_879_5;

/// Coefficients of `H(z) = g (1 - z^-1) / (1 - a z^-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DcBlockCoefficients {
    pub pole: f32,
    pub gain: f32,
}

impl Default for DcBlockCoefficients {
    fn default() -> Self {
        Self::from_pole(DEFAULT_POLE)
    }
}

impl DcBlockCoefficients {
    pub fn from_pole(pole: f32) -> Self {
        Self {
            pole,
            gain: 0.5 * (1.0 + pole),
        }
    }

    /// Solves the bilinear design for the pole in `[0, 1)` closest to unity.
    /// Falls back to [`DEFAULT_POLE`] when neither root lands in range.
    pub fn for_sample_rate(sample_rate: f32) -> Self {
        let omega = std::f64::consts::TAU * DC_BLOCK_CUTOFF_HZ / f64::from(sample_rate.max(1.0));
        let c = omega.cos();
        let g = HALF_POWER_GAIN;
        let r = (c * c - 1.0 - 2.0 * g * c + 2.0 * g).sqrt();

        let in_range = |a: f64| a.is_finite() && (0.0..1.0).contains(&a);
        let pole = [c + r, c - r]
            .into_iter()
            .find(|&a| in_range(a))
            .map_or(DEFAULT_POLE, |a| a as f32);

        Self::from_pole(pole)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DcBlocker {
    coefficients: DcBlockCoefficients,
    #[serde(skip)]
    last_input: f32,
    #[serde(skip)]
    last_output: f32,
}

impl DcBlocker {
    pub fn new(coefficients: DcBlockCoefficients) -> Self {
        Self {
            coefficients,
            last_input: 0.0,
            last_output: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, x: f32) -> f32 {
        let DcBlockCoefficients { pole, gain } = self.coefficients;
        let y = gain * (x - self.last_input) + pole * self.last_output;
        self.last_input = x;
        self.last_output = y;
        y
    }
}

impl SampleProcessor for DcBlocker {
    fn process(&mut self, dst: &mut [f32], src: &[f32]) {
        debug_assert!(dst.len() >= src.len());
        for (out, &x) in dst.iter_mut().zip(src) {
            *out = self.tick(x);
        }
    }
}

impl Reconfigurable<DcBlockCoefficients> for DcBlocker {
    fn update_config(&mut self, config: DcBlockCoefficients) {
        self.coefficients = config;
    }
}
