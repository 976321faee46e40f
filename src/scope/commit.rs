//! Staged configuration: parameter changes are diffed at block start and
//! applied in a fixed order before the channel touches any samples.

use std::fmt;

use serde::{Serialize, Serializer};
use tracing::trace;

use super::channel::{AcquisitionState, Channel, Input};
use super::params::{ChannelParameters, TriggerMode, XY_RECORD_TIME};
use super::render::{AxisScale, STREAM_DIVISIONS};
use super::{BUFFER_CAPACITY, PRE_TRIGGER_CAPACITY};
use crate::dsp::Reconfigurable;
use crate::dsp::oversampler::Oversampler;
use crate::dsp::sweep::SweepConfig;
use crate::util::audio::{millis_to_samples, seconds_to_samples};

/// Amplitude of the horizontal sweep in display units.
pub const SWEEP_PEAK: f32 = 1.0;
/// Longest stretch auto-sweep waits for a trigger before free-running.
pub const AUTO_SWEEP_SECONDS: f32 = 1.0;

/// Configuration categories, declared in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Stage {
    ParameterSource,
    ScopeMode,
    CouplingX,
    CouplingY,
    CouplingExt,
    Oversampler,
    XyRecord,
    SweepLength,
    PreTrigger,
    SweepGenerator,
    TriggerInput,
    TriggerHold,
    HorizontalScale,
    VerticalScale,
    Trigger,
    TriggerReset,
}

impl Stage {
    pub const COMMIT_ORDER: [Stage; 16] = [
        Stage::ParameterSource,
        Stage::ScopeMode,
        Stage::CouplingX,
        Stage::CouplingY,
        Stage::CouplingExt,
        Stage::Oversampler,
        Stage::XyRecord,
        Stage::SweepLength,
        Stage::PreTrigger,
        Stage::SweepGenerator,
        Stage::TriggerInput,
        Stage::TriggerHold,
        Stage::HorizontalScale,
        Stage::VerticalScale,
        Stage::Trigger,
        Stage::TriggerReset,
    ];

    const fn bit(self) -> u16 {
        1 << self as u8
    }

    /// Categories whose derived values depend on this one.
    pub const fn implies(self) -> &'static [Stage] {
        match self {
            Stage::ParameterSource => &[
                Stage::ScopeMode,
                Stage::CouplingX,
                Stage::CouplingY,
                Stage::CouplingExt,
                Stage::Oversampler,
                Stage::XyRecord,
                Stage::SweepLength,
                Stage::PreTrigger,
                Stage::SweepGenerator,
                Stage::TriggerInput,
                Stage::TriggerHold,
                Stage::HorizontalScale,
                Stage::VerticalScale,
                Stage::Trigger,
            ],
            Stage::Oversampler => &[Stage::XyRecord, Stage::SweepLength, Stage::TriggerHold],
            Stage::SweepLength => &[Stage::PreTrigger, Stage::SweepGenerator, Stage::TriggerHold],
            Stage::VerticalScale => &[Stage::Trigger],
            _ => &[],
        }
    }

    /// Applying any of these abandons a partially collected sweep.
    pub const fn restarts_acquisition(self) -> bool {
        matches!(
            self,
            Stage::ScopeMode
                | Stage::Oversampler
                | Stage::SweepLength
                | Stage::PreTrigger
                | Stage::SweepGenerator
        )
    }
}

/// Set of pending categories. Iterates in commit order.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtySet(u16);

impl DirtySet {
    pub const EMPTY: Self = Self(0);

    /// Everything a freshly constructed channel must resolve.
    pub fn initial() -> Self {
        let mut set = Self::EMPTY;
        set.mark(Stage::ParameterSource);
        set
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, stage: Stage) -> bool {
        self.0 & stage.bit() != 0
    }

    /// Marks `stage` together with everything it implies.
    pub fn mark(&mut self, stage: Stage) {
        if self.contains(stage) {
            return;
        }
        self.0 |= stage.bit();
        for &dependent in stage.implies() {
            self.mark(dependent);
        }
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn iter(self) -> impl Iterator<Item = Stage> {
        Stage::COMMIT_ORDER
            .into_iter()
            .filter(move |stage| self.contains(*stage))
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl fmt::Debug for DirtySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for DirtySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Values the channel last saw, and the categories that changed since the
/// last commit.
#[derive(Debug, Clone, Serialize)]
pub struct StagedState {
    parameters: ChannelParameters,
    xy_record_time: f32,
    use_global: bool,
    pending: DirtySet,
}

impl Default for StagedState {
    fn default() -> Self {
        Self {
            parameters: ChannelParameters::default(),
            xy_record_time: XY_RECORD_TIME.default,
            use_global: false,
            pending: DirtySet::initial(),
        }
    }
}

impl StagedState {
    pub fn pending(&self) -> DirtySet {
        self.pending
    }

    pub fn parameters(&self) -> &ChannelParameters {
        &self.parameters
    }

    pub fn mark(&mut self, stage: Stage) {
        self.pending.mark(stage);
    }

    /// Compares a sanitized parameter set against the last observed one and
    /// marks every category that differs.
    pub fn observe(&mut self, next: &ChannelParameters, xy_record_time: f32, use_global: bool) {
        let prev = &self.parameters;
        let mut pending = self.pending;

        if use_global != self.use_global {
            pending.mark(Stage::ParameterSource);
        }
        if next.mode != prev.mode {
            pending.mark(Stage::ScopeMode);
        }
        if next.coupling_x != prev.coupling_x {
            pending.mark(Stage::CouplingX);
        }
        if next.coupling_y != prev.coupling_y {
            pending.mark(Stage::CouplingY);
        }
        if next.coupling_ext != prev.coupling_ext {
            pending.mark(Stage::CouplingExt);
        }
        if next.oversampling != prev.oversampling {
            pending.mark(Stage::Oversampler);
        }
        if xy_record_time != self.xy_record_time {
            pending.mark(Stage::XyRecord);
        }
        if next.time_division != prev.time_division {
            pending.mark(Stage::SweepLength);
        }
        if next.horizontal_position != prev.horizontal_position {
            pending.mark(Stage::HorizontalScale);
            pending.mark(Stage::PreTrigger);
            pending.mark(Stage::SweepGenerator);
        }
        if next.horizontal_division != prev.horizontal_division {
            pending.mark(Stage::HorizontalScale);
        }
        if next.sweep_type != prev.sweep_type {
            pending.mark(Stage::SweepGenerator);
        }
        if next.trigger_input != prev.trigger_input {
            pending.mark(Stage::TriggerInput);
        }
        if next.trigger_hold != prev.trigger_hold {
            pending.mark(Stage::TriggerHold);
        }
        if next.vertical_division != prev.vertical_division
            || next.vertical_position != prev.vertical_position
        {
            pending.mark(Stage::VerticalScale);
        }
        if next.trigger_hysteresis != prev.trigger_hysteresis
            || next.trigger_level != prev.trigger_level
            || next.trigger_mode != prev.trigger_mode
            || next.trigger_type != prev.trigger_type
        {
            pending.mark(Stage::Trigger);
        }
        if next.trigger_reset {
            pending.mark(Stage::TriggerReset);
        }

        self.parameters = ChannelParameters {
            trigger_reset: false,
            ..*next
        };
        self.xy_record_time = xy_record_time;
        self.use_global = use_global;
        self.pending = pending;
    }

    fn take_pending(&mut self) -> DirtySet {
        self.pending.take()
    }
}

impl Channel {
    /// Applies every pending category in commit order. Returns what was applied.
    pub(super) fn commit_staged(&mut self) -> DirtySet {
        let applied = self.staged.take_pending();
        if applied.is_empty() {
            return applied;
        }

        for stage in applied.iter() {
            self.apply_stage(stage);
        }

        if applied.iter().any(Stage::restarts_acquisition) {
            self.state = AcquisitionState::Listening;
        }
        self.clear_stream = true;

        trace!(
            stages = ?applied,
            sweep = self.sweep_size,
            pre_trigger = self.pre_trigger,
            "committed staged configuration"
        );
        applied
    }

    fn apply_stage(&mut self, stage: Stage) {
        let params = *self.staged.parameters();
        let rate = self.working_rate();

        match stage {
            Stage::ParameterSource => {
                self.flags.use_global = self.staged.use_global;
            }
            Stage::ScopeMode => {
                self.mode = params.mode;
                self.display_head = 0;
            }
            Stage::CouplingX => self.coupling[Input::X as usize] = params.coupling_x,
            Stage::CouplingY => self.coupling[Input::Y as usize] = params.coupling_y,
            Stage::CouplingExt => self.coupling[Input::Ext as usize] = params.coupling_ext,
            Stage::Oversampler => {
                self.oversampling = params.oversampling;
                for oversampler in &mut self.oversamplers {
                    oversampler.set_factor(params.oversampling);
                }
            }
            Stage::XyRecord => {
                self.xy_record_size = millis_to_samples(rate, self.staged.xy_record_time)
                    .clamp(1, BUFFER_CAPACITY);
            }
            Stage::SweepLength => {
                let per_division = millis_to_samples(rate, params.time_division);
                self.sweep_size = (STREAM_DIVISIONS as usize)
                    .saturating_mul(per_division)
                    .clamp(1, BUFFER_CAPACITY);
            }
            Stage::PreTrigger => {
                let fraction = 0.5 * (0.01 * params.horizontal_position + 1.0);
                let samples = (fraction * (self.sweep_size - 1) as f32).max(0.0) as usize;
                self.pre_trigger = samples.min(PRE_TRIGGER_CAPACITY);
                self.delay.set_delay(self.pre_trigger);
                self.delay.clear();
            }
            Stage::SweepGenerator => {
                self.sweep.update_config(SweepConfig {
                    sample_rate: rate,
                    frequency: rate / self.sweep_size as f32,
                    amplitude: SWEEP_PEAK,
                    waveform: params.sweep_type,
                });
            }
            Stage::TriggerInput => self.trigger_input = params.trigger_input,
            Stage::TriggerHold => {
                let hold = seconds_to_samples(rate, params.trigger_hold).max(self.sweep_size);
                self.trigger_hold = hold;
                let mut config = self.trigger.config();
                config.hold_samples = hold;
                self.trigger.update_config(config);
                self.auto_sweep_limit = seconds_to_samples(rate, AUTO_SWEEP_SECONDS).max(hold);
                self.auto_sweep_counter = 0;
            }
            Stage::HorizontalScale => {
                self.horizontal =
                    AxisScale::from_division(params.horizontal_division, params.horizontal_position);
            }
            Stage::VerticalScale => {
                self.vertical =
                    AxisScale::from_division(params.vertical_division, params.vertical_position);
            }
            Stage::Trigger => {
                let span = STREAM_DIVISIONS * params.vertical_division;
                let mut config = self.trigger.config();
                config.kind = params.trigger_type;
                config.mode = params.trigger_mode;
                config.threshold = 0.5 * span * 0.01 * params.trigger_level;
                config.hysteresis = 0.01 * params.trigger_hysteresis * span;
                self.trigger.update_config(config);
                self.auto_sweep =
                    !matches!(params.trigger_mode, TriggerMode::Single | TriggerMode::Manual);
            }
            Stage::TriggerReset => {
                self.trigger.reset_single();
                self.trigger.arm_manual();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::params::{OversamplingFactor, TIME_DIVISION};

    fn settled() -> StagedState {
        let mut staged = StagedState::default();
        staged.take_pending();
        staged
    }

    #[test]
    fn commit_order_matches_declaration() {
        for (index, stage) in Stage::COMMIT_ORDER.iter().enumerate() {
            assert_eq!(*stage as usize, index);
        }
    }

    #[test]
    fn initial_set_covers_everything_but_reset() {
        let initial = DirtySet::initial();
        assert_eq!(initial.len(), Stage::COMMIT_ORDER.len() - 1);
        assert!(!initial.contains(Stage::TriggerReset));
    }

    #[test]
    fn oversampler_implies_sweep_dependents() {
        let mut set = DirtySet::EMPTY;
        set.mark(Stage::Oversampler);
        let stages: Vec<Stage> = set.iter().collect();
        assert_eq!(
            stages,
            vec![
                Stage::Oversampler,
                Stage::XyRecord,
                Stage::SweepLength,
                Stage::PreTrigger,
                Stage::SweepGenerator,
                Stage::TriggerHold,
            ]
        );
    }

    #[test]
    fn unchanged_parameters_stage_nothing() {
        let mut staged = settled();
        let params = *staged.parameters();
        staged.observe(&params, XY_RECORD_TIME.default, false);
        assert!(staged.pending().is_empty());
    }

    #[test]
    fn horizontal_position_stages_scale_pretrigger_and_sweep() {
        let mut staged = settled();
        let params = ChannelParameters {
            horizontal_position: 25.0,
            ..*staged.parameters()
        };
        staged.observe(&params, XY_RECORD_TIME.default, false);
        let stages: Vec<Stage> = staged.pending().iter().collect();
        assert_eq!(
            stages,
            vec![Stage::PreTrigger, Stage::SweepGenerator, Stage::HorizontalScale]
        );
    }

    #[test]
    fn vertical_change_restages_trigger() {
        let mut staged = settled();
        let params = ChannelParameters {
            vertical_division: 1.0,
            ..*staged.parameters()
        };
        staged.observe(&params, XY_RECORD_TIME.default, false);
        assert!(staged.pending().contains(Stage::VerticalScale));
        assert!(staged.pending().contains(Stage::Trigger));
    }

    #[test]
    fn reset_pulse_is_not_remembered() {
        let mut staged = settled();
        let params = ChannelParameters {
            trigger_reset: true,
            ..*staged.parameters()
        };
        staged.observe(&params, XY_RECORD_TIME.default, false);
        assert!(staged.pending().contains(Stage::TriggerReset));
        assert!(!staged.parameters().trigger_reset);

        staged.take_pending();
        staged.observe(&params, XY_RECORD_TIME.default, false);
        assert!(staged.pending().contains(Stage::TriggerReset));
    }

    #[test]
    fn source_switch_marks_every_category() {
        let mut staged = settled();
        let params = *staged.parameters();
        staged.observe(&params, XY_RECORD_TIME.default, true);
        assert_eq!(staged.pending(), DirtySet::initial());
    }

    #[test]
    fn pending_changes_accumulate_until_taken() {
        let mut staged = settled();
        let mut params = *staged.parameters();
        params.oversampling = OversamplingFactor::X2;
        staged.observe(&params, XY_RECORD_TIME.default, false);
        params.time_division = TIME_DIVISION.max;
        staged.observe(&params, XY_RECORD_TIME.default, false);
        assert!(staged.pending().contains(Stage::Oversampler));
        assert!(staged.pending().contains(Stage::SweepLength));
    }
}
