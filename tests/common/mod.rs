//! Shared helpers for driving an engine block by block.

use openscope::dsp::ProcessorUpdate;
use openscope::scope::channel::FlushStats;
use openscope::scope::params::{ChannelLayout, ChannelParameters, Controls};
use openscope::{ChannelInput, Oscilloscope, ScopeBlock};

pub const RATE: f32 = 48_000.0;
pub const BLOCK: usize = 256;

/// An engine plus the control values it was last given.
pub struct Rig {
    pub scope: Oscilloscope,
    pub controls: Controls,
}

impl Rig {
    pub fn new(layout: ChannelLayout) -> Self {
        let scope = Oscilloscope::new(RATE, layout.channels()).expect("engine");
        Self {
            scope,
            controls: Controls::new(layout),
        }
    }

    /// Applies `edit` to every channel's parameters and pushes the controls.
    pub fn configure(&mut self, edit: impl Fn(&mut ChannelParameters)) {
        for channel in &mut self.controls.channels {
            edit(&mut channel.parameters);
        }
        self.apply();
    }

    pub fn apply(&mut self) {
        self.scope.update_settings(&self.controls);
    }

    /// Feeds the same signals to every channel in `BLOCK`-sized pieces, with
    /// `y` doubling as the external trigger input.
    pub fn feed(&mut self, x: &[f32], y: &[f32]) -> FlushStats {
        self.feed_with_ext(x, y, y)
    }

    pub fn feed_with_ext(&mut self, x: &[f32], y: &[f32], ext: &[f32]) -> FlushStats {
        let mut stats = FlushStats::default();
        let channels = self.scope.layout().channels();
        let blocks = x.chunks(BLOCK).zip(y.chunks(BLOCK)).zip(ext.chunks(BLOCK));
        for ((xs, ys), es) in blocks {
            let inputs: Vec<ChannelInput<'_>> = (0..channels)
                .map(|_| ChannelInput::new(xs, ys, es))
                .collect();
            self.apply();
            if let ProcessorUpdate::Snapshot(report) =
                self.scope.process(&ScopeBlock::new(ys.len(), &inputs), &mut [])
            {
                stats.merge(report.stats);
            }
        }
        stats
    }
}

pub fn sine(freq: f32, len: usize, phase: f32) -> Vec<f32> {
    (0..len)
        .map(|n| (std::f32::consts::TAU * freq * n as f32 / RATE + phase).sin())
        .collect()
}
