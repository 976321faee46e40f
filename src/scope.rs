//! Multi-channel signal acquisition engine.

pub mod arena;
pub mod channel;
pub mod commit;
pub mod params;
pub mod render;
pub mod stream;
pub mod visibility;

use serde::Serialize;
use tracing::debug;

use crate::dsp::ProcessorUpdate;
use crate::dsp::dc_block::DcBlockCoefficients;
use crate::error::EngineError;
use arena::{BufferArena, Region};
use channel::{Channel, ChannelSignals, FlushStats};
use commit::Stage;
use params::{ChannelLayout, Controls};
use stream::{FrameStream, StreamSink};

/// Length of every per-channel working buffer. Divisible by each oversampling ratio.
pub const BUFFER_CAPACITY: usize = 196_608;
/// Longest pre-trigger delay in working-rate samples.
pub const PRE_TRIGGER_CAPACITY: usize = 196_608;

/// Host-provided inputs for one channel. Any missing slice skips the channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelInput<'a> {
    pub x: Option<&'a [f32]>,
    pub y: Option<&'a [f32]>,
    pub ext: Option<&'a [f32]>,
}

impl<'a> ChannelInput<'a> {
    pub fn new(x: &'a [f32], y: &'a [f32], ext: &'a [f32]) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ext: Some(ext),
        }
    }

    fn signals(&self, frames: usize) -> Option<ChannelSignals<'a>> {
        let x = self.x?.get(..frames)?;
        let y = self.y?.get(..frames)?;
        let ext = self.ext?.get(..frames)?;
        Some(ChannelSignals { x, y, ext })
    }
}

/// Pass-through destinations for one channel.
#[derive(Debug, Default)]
pub struct ChannelOutput<'a> {
    pub x: Option<&'a mut [f32]>,
    pub y: Option<&'a mut [f32]>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScopeBlock<'a> {
    pub frames: usize,
    pub inputs: &'a [ChannelInput<'a>],
}

impl<'a> ScopeBlock<'a> {
    pub fn new(frames: usize, inputs: &'a [ChannelInput<'a>]) -> Self {
        Self { frames, inputs }
    }
}

/// What a block produced. Only returned when at least one window completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BlockReport {
    pub stats: FlushStats,
    pub skipped: usize,
}

/// Decimated copy of the last flushed window, for a small inline display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preview<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub visible: bool,
}

#[derive(Serialize)]
struct StateDump<'a> {
    layout: ChannelLayout,
    sample_rate: f32,
    dc_block: DcBlockCoefficients,
    channels: &'a [Channel],
}

pub struct Oscilloscope<S: StreamSink = FrameStream> {
    layout: ChannelLayout,
    sample_rate: f32,
    dc_block: DcBlockCoefficients,
    channels: Vec<Channel>,
    sinks: Vec<S>,
    arena: BufferArena,
}

impl Oscilloscope<FrameStream> {
    pub fn new(sample_rate: f32, channels: usize) -> Result<Self, EngineError> {
        let sinks = (0..channels).map(|_| FrameStream::default()).collect();
        Self::with_sinks(sample_rate, sinks)
    }
}

impl<S: StreamSink> Oscilloscope<S> {
    /// One sink per channel; the sink count picks the layout.
    pub fn with_sinks(sample_rate: f32, sinks: Vec<S>) -> Result<Self, EngineError> {
        let layout = ChannelLayout::from_channels(sinks.len())
            .ok_or(EngineError::UnsupportedChannels(sinks.len()))?;
        let arena = BufferArena::allocate(layout.channels(), BUFFER_CAPACITY)?;

        let sample_rate = sanitize_rate(sample_rate);
        let dc_block = DcBlockCoefficients::for_sample_rate(sample_rate);
        let channels = (0..layout.channels())
            .map(|_| Channel::new(sample_rate, dc_block))
            .collect();

        debug!(
            ?layout,
            sample_rate,
            arena_samples = layout.channels() * arena::REGIONS_PER_CHANNEL * BUFFER_CAPACITY,
            "oscilloscope initialised"
        );

        Ok(Self {
            layout,
            sample_rate,
            dc_block,
            channels,
            sinks,
            arena,
        })
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn sink(&self, index: usize) -> Option<&S> {
        self.sinks.get(index)
    }

    pub fn sink_mut(&mut self, index: usize) -> Option<&mut S> {
        self.sinks.get_mut(index)
    }

    pub fn update_sample_rate(&mut self, sample_rate: f32) {
        let sample_rate = sanitize_rate(sample_rate);
        self.sample_rate = sample_rate;
        self.dc_block = DcBlockCoefficients::for_sample_rate(sample_rate);
        for channel in &mut self.channels {
            channel.set_host_rate(sample_rate, self.dc_block);
            channel.staged.mark(Stage::Oversampler);
        }
        debug!(sample_rate, pole = self.dc_block.pole, "sample rate updated");
    }

    /// Reads the block's control values: resolves visibility and stages any
    /// parameter changes. Nothing is applied until the channel next processes.
    pub fn update_settings(&mut self, controls: &Controls) {
        let multichannel = self.layout.is_multichannel();
        let resolved = visibility::resolve(
            controls.channels.iter().map(|c| &c.switches),
            controls.freeze,
            multichannel,
        );

        for (index, (channel, visibility)) in self.channels.iter_mut().zip(resolved).enumerate() {
            channel.flags.set_visibility(visibility);

            let Some(selected) = controls.selected(index, self.layout) else {
                continue;
            };
            let use_global = multichannel && controls.channels[index].switches.use_global;
            let xy_record_time = params::XY_RECORD_TIME.clamp(controls.xy_record_time);
            channel
                .staged
                .observe(&selected.sanitized(), xy_record_time, use_global);
        }
    }

    /// Copies X/Y inputs to the outputs, then runs every channel whose inputs
    /// are all present and long enough.
    pub fn process(
        &mut self,
        block: &ScopeBlock<'_>,
        outputs: &mut [ChannelOutput<'_>],
    ) -> ProcessorUpdate<BlockReport> {
        let frames = block.frames;
        for (input, output) in block.inputs.iter().zip(outputs.iter_mut()) {
            bypass(input.x, output.x.as_deref_mut(), frames);
            bypass(input.y, output.y.as_deref_mut(), frames);
        }

        let mut report = BlockReport::default();
        let lanes = self
            .channels
            .iter_mut()
            .zip(self.sinks.iter_mut())
            .zip(self.arena.channels_mut())
            .enumerate();

        for (index, ((channel, sink), mut buffers)) in lanes {
            let Some(signals) = block.inputs.get(index).and_then(|input| input.signals(frames)) else {
                report.skipped += 1;
                continue;
            };

            channel.commit_staged();
            report
                .stats
                .merge(channel.process(&mut buffers, signals, sink));
        }

        if report.stats.windows > 0 {
            ProcessorUpdate::Snapshot(report)
        } else {
            ProcessorUpdate::None
        }
    }

    pub fn preview(&self, index: usize) -> Option<Preview<'_>> {
        let channel = self.channels.get(index)?;
        let len = channel.preview_len;
        Some(Preview {
            x: self.arena.region(index, Region::PreviewX)?.get(..len)?,
            y: self.arena.region(index, Region::PreviewY)?.get(..len)?,
            visible: channel.flags.visible,
        })
    }

    /// Debug snapshot of every channel's configuration and acquisition state.
    pub fn serialize_state(&self) -> Result<serde_json::Value, EngineError> {
        let dump = StateDump {
            layout: self.layout,
            sample_rate: self.sample_rate,
            dc_block: self.dc_block,
            channels: &self.channels,
        };
        Ok(serde_json::to_value(&dump)?)
    }
}

fn sanitize_rate(sample_rate: f32) -> f32 {
    if sample_rate.is_finite() && sample_rate >= 1.0 {
        sample_rate
    } else {
        crate::util::audio::DEFAULT_SAMPLE_RATE
    }
}

fn bypass(src: Option<&[f32]>, dst: Option<&mut [f32]>, frames: usize) {
    if let (Some(src), Some(dst)) = (src, dst) {
        let count = frames.min(src.len()).min(dst.len());
        dst[..count].copy_from_slice(&src[..count]);
    }
}
