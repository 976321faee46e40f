//! Edge trigger detector with hysteresis, hold-off and single/manual latches.

use super::Reconfigurable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    None,
    SimpleRising,
    SimpleFalling,
    #[default]
    AdvancedRising,
    AdvancedFalling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Fires once, then stays latched until [`Trigger::reset_single`].
    Single,
    /// Fires only after [`Trigger::arm_manual`], once per arming.
    Manual,
    #[default]
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TriggerState {
    #[default]
    Idle,
    Fired,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TriggerConfig {
    pub kind: TriggerType,
    pub mode: TriggerMode,
    pub threshold: f32,
    pub hysteresis: f32,
    pub hold_samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trigger {
    config: TriggerConfig,
    state: TriggerState,
    previous: f32,
    /// Advanced edges need the signal to leave the hysteresis band first.
    primed: bool,
    hold_counter: usize,
    single_armed: bool,
    manual_armed: bool,
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new(TriggerConfig::default())
    }
}

impl Trigger {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            state: TriggerState::Idle,
            previous: 0.0,
            primed: false,
            hold_counter: usize::MAX,
            single_armed: true,
            manual_armed: false,
        }
    }

    pub fn config(&self) -> TriggerConfig {
        self.config
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn reset_single(&mut self) {
        self.single_armed = true;
    }

    pub fn arm_manual(&mut self) {
        self.manual_armed = true;
    }

    pub fn process_sample(&mut self, x: f32) -> TriggerState {
        let TriggerConfig {
            kind,
            threshold,
            hysteresis,
            ..
        } = self.config;

        let edge = match kind {
            TriggerType::None => false,
            TriggerType::SimpleRising => self.previous < threshold && x >= threshold,
            TriggerType::SimpleFalling => self.previous > threshold && x <= threshold,
            TriggerType::AdvancedRising => {
                if x < threshold - hysteresis {
                    self.primed = true;
                }
                let edge = self.primed && x >= threshold;
                self.primed &= !edge;
                edge
            }
            TriggerType::AdvancedFalling => {
                if x > threshold + hysteresis {
                    self.primed = true;
                }
                let edge = self.primed && x <= threshold;
                self.primed &= !edge;
                edge
            }
        };
        self.previous = x;
        self.hold_counter = self.hold_counter.saturating_add(1);

        let released = edge && self.hold_counter > self.config.hold_samples;
        let fired = released
            && match self.config.mode {
                TriggerMode::Repeat => true,
                TriggerMode::Single => std::mem::take(&mut self.single_armed),
                TriggerMode::Manual => std::mem::take(&mut self.manual_armed),
            };

        if fired {
            self.hold_counter = 0;
            self.state = TriggerState::Fired;
        } else {
            self.state = TriggerState::Idle;
        }
        self.state
    }
}

impl Reconfigurable<TriggerConfig> for Trigger {
    fn update_config(&mut self, config: TriggerConfig) {
        if config.kind != self.config.kind {
            self.primed = false;
        }
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_fires(trigger: &mut Trigger, samples: &[f32]) -> Vec<usize> {
        samples
            .iter()
            .enumerate()
            .filter(|&(_, &x)| trigger.process_sample(x) == TriggerState::Fired)
            .map(|(i, _)| i)
            .collect()
    }

    fn config(kind: TriggerType, mode: TriggerMode) -> TriggerConfig {
        TriggerConfig {
            kind,
            mode,
            threshold: 0.0,
            hysteresis: 0.1,
            hold_samples: 0,
        }
    }

    #[test]
    fn simple_rising_fires_on_crossing() {
        let mut trigger = Trigger::new(config(TriggerType::SimpleRising, TriggerMode::Repeat));
        let fires = count_fires(&mut trigger, &[-1.0, -0.5, 0.5, 1.0, -0.5, 0.2]);
        assert_eq!(fires, vec![2, 5]);
    }

    #[test]
    fn simple_falling_fires_on_crossing() {
        let mut trigger = Trigger::new(config(TriggerType::SimpleFalling, TriggerMode::Repeat));
        let fires = count_fires(&mut trigger, &[1.0, 0.5, -0.5, 0.3, -0.3]);
        assert_eq!(fires, vec![2, 4]);
    }

    #[test]
    fn advanced_rising_ignores_chatter_inside_band() {
        let mut trigger = Trigger::new(config(TriggerType::AdvancedRising, TriggerMode::Repeat));
        // Dips to -0.05 stay inside the band and must not re-arm.
        let fires = count_fires(&mut trigger, &[-0.5, 0.01, -0.05, 0.02, -0.05, 0.03, -0.2, 0.1]);
        assert_eq!(fires, vec![1, 7]);
    }

    #[test]
    fn advanced_falling_mirrors_rising() {
        let mut trigger = Trigger::new(config(TriggerType::AdvancedFalling, TriggerMode::Repeat));
        let fires = count_fires(&mut trigger, &[0.5, -0.01, 0.05, -0.02, 0.3, -0.1]);
        assert_eq!(fires, vec![1, 5]);
    }

    #[test]
    fn none_never_fires() {
        let mut trigger = Trigger::new(config(TriggerType::None, TriggerMode::Repeat));
        assert!(count_fires(&mut trigger, &[-1.0, 1.0, -1.0, 1.0]).is_empty());
    }

    #[test]
    fn hold_suppresses_refire() {
        let mut cfg = config(TriggerType::SimpleRising, TriggerMode::Repeat);
        cfg.hold_samples = 4;
        let mut trigger = Trigger::new(cfg);
        let square = [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0];
        assert_eq!(count_fires(&mut trigger, &square), vec![1, 7]);
    }

    #[test]
    fn single_latches_until_reset() {
        let mut trigger = Trigger::new(config(TriggerType::SimpleRising, TriggerMode::Single));
        let square = [-1.0, 1.0, -1.0, 1.0];
        assert_eq!(count_fires(&mut trigger, &square), vec![1]);
        assert!(count_fires(&mut trigger, &square).is_empty());
        trigger.reset_single();
        assert_eq!(count_fires(&mut trigger, &square), vec![1]);
    }

    #[test]
    fn manual_requires_arming() {
        let mut trigger = Trigger::new(config(TriggerType::SimpleRising, TriggerMode::Manual));
        let square = [-1.0, 1.0, -1.0, 1.0];
        assert!(count_fires(&mut trigger, &square).is_empty());
        trigger.arm_manual();
        assert_eq!(count_fires(&mut trigger, &square), vec![1]);
    }
}
