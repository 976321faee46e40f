//! Control surface: parameter enums, metadata ranges and the per-block control snapshot.

use serde::{Deserialize, Serialize};

pub use crate::dsp::oversampler::OversamplingFactor;
pub use crate::dsp::sweep::SweepWaveform;
pub use crate::dsp::trigger::{TriggerMode, TriggerType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    Xy,
    #[default]
    Triggered,
    Goniometer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coupling {
    Ac,
    #[default]
    Dc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerInput {
    #[default]
    Y,
    Ext,
}

/// Instance width. Shared parameters and per-channel switches only exist above X1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    X1,
    X2,
    X4,
}

impl ChannelLayout {
    pub const fn channels(self) -> usize {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }

    pub const fn is_multichannel(self) -> bool {
        !matches!(self, Self::X1)
    }

    pub fn from_channels(count: usize) -> Option<Self> {
        match count {
            1 => Some(Self::X1),
            2 => Some(Self::X2),
            4 => Some(Self::X4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Non-finite values fall back to the default.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }
}

/// Milliseconds per horizontal division.
pub const TIME_DIVISION: ParamRange = ParamRange::new(0.05, 50.0, 1.0);
pub const HORIZONTAL_DIVISION: ParamRange = ParamRange::new(1.0e-3, 10.0, 0.5);
/// Percent of the half-screen.
pub const HORIZONTAL_POSITION: ParamRange = ParamRange::new(-100.0, 100.0, 0.0);
pub const VERTICAL_DIVISION: ParamRange = ParamRange::new(1.0e-3, 10.0, 0.5);
pub const VERTICAL_POSITION: ParamRange = ParamRange::new(-100.0, 100.0, 0.0);
pub const TRIGGER_HYSTERESIS: ParamRange = ParamRange::new(0.0, 50.0, 1.0);
pub const TRIGGER_LEVEL: ParamRange = ParamRange::new(-100.0, 100.0, 0.0);
/// Seconds.
pub const TRIGGER_HOLD: ParamRange = ParamRange::new(0.0, 60.0, 0.0);
/// Milliseconds.
pub const XY_RECORD_TIME: ParamRange = ParamRange::new(1.0, 50.0, 10.0);

/// One full set of trigger/sweep/scale parameters. Each channel has one and
/// multi-channel instances carry an extra shared set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelParameters {
    pub mode: ScopeMode,
    pub coupling_x: Coupling,
    pub coupling_y: Coupling,
    pub coupling_ext: Coupling,
    pub oversampling: OversamplingFactor,
    pub sweep_type: SweepWaveform,
    pub time_division: f32,
    pub horizontal_division: f32,
    pub horizontal_position: f32,
    pub vertical_division: f32,
    pub vertical_position: f32,
    pub trigger_hysteresis: f32,
    pub trigger_level: f32,
    pub trigger_hold: f32,
    pub trigger_mode: TriggerMode,
    pub trigger_type: TriggerType,
    pub trigger_input: TriggerInput,
    /// One-shot pulse; never persisted.
    #[serde(skip)]
    pub trigger_reset: bool,
}

impl Default for ChannelParameters {
    fn default() -> Self {
        Self {
            mode: ScopeMode::default(),
            coupling_x: Coupling::default(),
            coupling_y: Coupling::default(),
            coupling_ext: Coupling::default(),
            oversampling: OversamplingFactor::default(),
            sweep_type: SweepWaveform::default(),
            time_division: TIME_DIVISION.default,
            horizontal_division: HORIZONTAL_DIVISION.default,
            horizontal_position: HORIZONTAL_POSITION.default,
            vertical_division: VERTICAL_DIVISION.default,
            vertical_position: VERTICAL_POSITION.default,
            trigger_hysteresis: TRIGGER_HYSTERESIS.default,
            trigger_level: TRIGGER_LEVEL.default,
            trigger_hold: TRIGGER_HOLD.default,
            trigger_mode: TriggerMode::default(),
            trigger_type: TriggerType::default(),
            trigger_input: TriggerInput::default(),
            trigger_reset: false,
        }
    }
}

impl ChannelParameters {
    pub fn sanitized(mut self) -> Self {
        self.time_division = TIME_DIVISION.clamp(self.time_division);
        self.horizontal_division = HORIZONTAL_DIVISION.clamp(self.horizontal_division);
        self.horizontal_position = HORIZONTAL_POSITION.clamp(self.horizontal_position);
        self.vertical_division = VERTICAL_DIVISION.clamp(self.vertical_division);
        self.vertical_position = VERTICAL_POSITION.clamp(self.vertical_position);
        self.trigger_hysteresis = TRIGGER_HYSTERESIS.clamp(self.trigger_hysteresis);
        self.trigger_level = TRIGGER_LEVEL.clamp(self.trigger_level);
        self.trigger_hold = TRIGGER_HOLD.clamp(self.trigger_hold);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSwitches {
    pub use_global: bool,
    pub freeze: bool,
    pub solo: bool,
    pub mute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelControls {
    pub parameters: ChannelParameters,
    pub switches: ChannelSwitches,
}

/// Control values as the host exposes them at the start of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub freeze: bool,
    pub xy_record_time: f32,
    pub global: ChannelParameters,
    pub channels: Vec<ChannelControls>,
}

impl Controls {
    pub fn new(layout: ChannelLayout) -> Self {
        Self {
            freeze: false,
            xy_record_time: XY_RECORD_TIME.default,
            global: ChannelParameters::default(),
            channels: vec![ChannelControls::default(); layout.channels()],
        }
    }

    /// Parameter set a channel reads this block.
    pub fn selected(&self, channel: usize, layout: ChannelLayout) -> Option<&ChannelParameters> {
        let controls = self.channels.get(channel)?;
        if layout.is_multichannel() && controls.switches.use_global {
            Some(&self.global)
        } else {
            Some(&controls.parameters)
        }
    }
}
