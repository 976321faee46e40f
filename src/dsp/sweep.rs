//! Periodic sweep-phase generator driving the horizontal axis in triggered mode.

use super::Reconfigurable;
use serde::{Deserialize, Serialize};

const PHASE_FULL_SCALE: f64 = 4_294_967_296.0; // 2^32

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepWaveform {
    #[default]
    Sawtooth,
    Triangular,
    Sine,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepConfig {
    pub sample_rate: f32,
    pub frequency: f32,
    pub amplitude: f32,
    pub waveform: SweepWaveform,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::util::audio::DEFAULT_SAMPLE_RATE,
            frequency: 1.0,
            amplitude: 1.0,
            waveform: SweepWaveform::Sawtooth,
        }
    }
}

/// 32-bit phase accumulator oscillator. Outputs span `[-amplitude, amplitude]`
/// and the sawtooth starts at `-amplitude` right after [`SweepGenerator::reset_phase`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepGenerator {
    config: SweepConfig,
    phase: u32,
    step: u32,
}

impl SweepGenerator {
    pub fn new(config: SweepConfig) -> Self {
        let mut generator = Self::default();
        generator.update_config(config);
        generator
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    pub fn reset_phase(&mut self) {
        self.phase = 0;
    }

    /// Emits the sample at the current phase, then advances one tick.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let p = (f64::from(self.phase) / PHASE_FULL_SCALE) as f32;
        self.phase = self.phase.wrapping_add(self.step);
        self.config.amplitude * shape(self.config.waveform, p)
    }
}

#[inline]
fn shape(waveform: SweepWaveform, p: f32) -> f32 {
    match waveform {
        SweepWaveform::Sawtooth => 2.0 * p - 1.0,
        SweepWaveform::Triangular => {
            if p < 0.5 {
                4.0 * p - 1.0
            } else {
                3.0 - 4.0 * p
            }
        }
        SweepWaveform::Sine => (std::f32::consts::TAU * p).sin(),
    }
}

impl Reconfigurable<SweepConfig> for SweepGenerator {
    fn update_config(&mut self, config: SweepConfig) {
        let ratio = f64::from(config.frequency) / f64::from(config.sample_rate.max(1.0));
        self.step = (ratio.max(0.0) * PHASE_FULL_SCALE).min(f64::from(u32::MAX)) as u32;
        self.config = config;
    }
}
