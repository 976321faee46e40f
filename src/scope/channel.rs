//! Per-channel acquisition: coupling, oversampling, the trigger/sweep state
//! machine and the flush path into the stream.

use serde::Serialize;

use super::PRE_TRIGGER_CAPACITY;
use super::arena::{ChannelBuffers, DisplayBuffers, WorkBuffers};
use super::commit::StagedState;
use super::params::{Coupling, OversamplingFactor, ScopeMode, TriggerInput};
use super::render::{self, AxisScale, DECIMATION_THRESHOLD, PREVIEW_THRESHOLD};
use super::stream::StreamSink;
use super::visibility::Visibility;
use crate::dsp::dc_block::{DcBlockCoefficients, DcBlocker};
use crate::dsp::delay::DelayLine;
use crate::dsp::oversampler::{LinearOversampler, Oversampler};
use crate::dsp::sweep::SweepGenerator;
use crate::dsp::trigger::{Trigger, TriggerState};
use crate::dsp::{Reconfigurable, SampleProcessor};
use crate::util::audio::lr_to_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionState {
    #[default]
    Listening,
    Sweeping,
}

/// Per-channel signal inputs. Indexes the coupling, DC-block and oversampler arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Input {
    X,
    Y,
    Ext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChannelFlags {
    pub use_global: bool,
    pub frozen: bool,
    pub visible: bool,
}

impl ChannelFlags {
    pub(super) fn set_visibility(&mut self, visibility: Visibility) {
        self.frozen = visibility.frozen;
        self.visible = visibility.visible;
    }
}

/// Host input slices for one channel, already checked against the block length.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSignals<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub ext: &'a [f32],
}

impl ChannelSignals<'_> {
    pub fn frames(&self) -> usize {
        self.y.len()
    }
}

/// Counts for one block on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlushStats {
    /// Completed sweeps or XY records, including frozen ones.
    pub windows: usize,
    /// Windows that reached the sink.
    pub flushes: usize,
    pub points: usize,
    pub frames: usize,
}

impl FlushStats {
    pub fn merge(&mut self, other: FlushStats) {
        self.windows += other.windows;
        self.flushes += other.flushes;
        self.points += other.points;
        self.frames += other.frames;
    }
}

/// The parts of channel state that evolve with the input, independent of
/// whether anything is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionProbe {
    pub state: AcquisitionState,
    pub display_head: usize,
    pub auto_sweep_counter: usize,
    pub sweep_phase: u32,
    pub trigger: TriggerState,
    pub sweep_size: usize,
    pub pre_trigger: usize,
    pub xy_record_size: usize,
}

#[derive(Debug, Serialize)]
pub struct Channel {
    pub(super) mode: ScopeMode,
    pub(super) coupling: [Coupling; 3],
    pub(super) dc_blockers: [DcBlocker; 3],
    pub(super) oversamplers: [LinearOversampler; 3],
    pub(super) oversampling: OversamplingFactor,
    pub(super) host_rate: f32,
    pub(super) delay: DelayLine,
    pub(super) sweep: SweepGenerator,
    pub(super) trigger: Trigger,
    pub(super) trigger_input: TriggerInput,
    pub(super) sweep_size: usize,
    pub(super) pre_trigger: usize,
    pub(super) xy_record_size: usize,
    pub(super) trigger_hold: usize,
    pub(super) horizontal: AxisScale,
    pub(super) vertical: AxisScale,
    pub(super) auto_sweep: bool,
    pub(super) auto_sweep_limit: usize,
    pub(super) auto_sweep_counter: usize,
    pub(super) state: AcquisitionState,
    pub(super) display_head: usize,
    pub(super) data_head: usize,
    pub(super) clear_stream: bool,
    pub(super) preview_len: usize,
    pub(super) flags: ChannelFlags,
    pub(super) staged: StagedState,
}

impl Channel {
    pub(super) fn new(host_rate: f32, dc_block: DcBlockCoefficients) -> Self {
        let oversampling = OversamplingFactor::default();
        Self {
            mode: ScopeMode::default(),
            coupling: [Coupling::default(); 3],
            dc_blockers: std::array::from_fn(|_| DcBlocker::new(dc_block)),
            oversamplers: std::array::from_fn(|_| LinearOversampler::new(oversampling)),
            oversampling,
            host_rate,
            delay: DelayLine::new(PRE_TRIGGER_CAPACITY),
            sweep: SweepGenerator::default(),
            trigger: Trigger::default(),
            trigger_input: TriggerInput::default(),
            sweep_size: 1,
            pre_trigger: 0,
            xy_record_size: 1,
            trigger_hold: 1,
            horizontal: AxisScale::default(),
            vertical: AxisScale::default(),
            auto_sweep: true,
            auto_sweep_limit: 1,
            auto_sweep_counter: 0,
            state: AcquisitionState::Listening,
            display_head: 0,
            data_head: 0,
            clear_stream: true,
            preview_len: 0,
            flags: ChannelFlags {
                visible: true,
                ..ChannelFlags::default()
            },
            staged: StagedState::default(),
        }
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    pub fn staged(&self) -> &StagedState {
        &self.staged
    }

    pub fn sweep_size(&self) -> usize {
        self.sweep_size
    }

    pub fn pre_trigger(&self) -> usize {
        self.pre_trigger
    }

    pub fn xy_record_size(&self) -> usize {
        self.xy_record_size
    }

    pub fn trigger_hold(&self) -> usize {
        self.trigger_hold
    }

    pub fn display_head(&self) -> usize {
        self.display_head
    }

    pub fn horizontal(&self) -> AxisScale {
        self.horizontal
    }

    pub fn vertical(&self) -> AxisScale {
        self.vertical
    }

    pub fn working_rate(&self) -> f32 {
        self.host_rate * self.oversampling.ratio() as f32
    }

    pub fn probe(&self) -> AcquisitionProbe {
        AcquisitionProbe {
            state: self.state,
            display_head: self.display_head,
            auto_sweep_counter: self.auto_sweep_counter,
            sweep_phase: self.sweep.phase(),
            trigger: self.trigger.state(),
            sweep_size: self.sweep_size,
            pre_trigger: self.pre_trigger,
            xy_record_size: self.xy_record_size,
        }
    }

    pub(super) fn set_host_rate(&mut self, host_rate: f32, dc_block: DcBlockCoefficients) {
        self.host_rate = host_rate;
        for blocker in &mut self.dc_blockers {
            blocker.update_config(dc_block);
        }
    }

    /// Runs one block through acquisition. Blocks larger than the working
    /// buffers are consumed in chunks.
    pub(super) fn process<S: StreamSink + ?Sized>(
        &mut self,
        buffers: &mut ChannelBuffers<'_>,
        signals: ChannelSignals<'_>,
        sink: &mut S,
    ) -> FlushStats {
        let mut stats = FlushStats::default();
        let chunk = (buffers.work.x.len() / self.oversampling.ratio()).max(1);
        let frames = signals.frames();

        let mut offset = 0;
        while offset < frames {
            let range = offset..offset + chunk.min(frames - offset);
            match self.mode {
                ScopeMode::Xy | ScopeMode::Goniometer => self.acquire_xy(
                    buffers,
                    &signals.x[range.clone()],
                    &signals.y[range.clone()],
                    sink,
                    &mut stats,
                ),
                ScopeMode::Triggered => self.acquire_triggered(
                    buffers,
                    &signals.y[range.clone()],
                    &signals.ext[range.clone()],
                    sink,
                    &mut stats,
                ),
            }
            offset = range.end;
        }
        stats
    }

    fn couple(&mut self, input: Input, temp: &mut [f32], dst: &mut [f32], src: &[f32]) {
        let index = input as usize;
        let upsampled = &mut dst[..src.len() * self.oversampling.ratio()];
        match self.coupling[index] {
            Coupling::Ac => {
                let filtered = &mut temp[..src.len()];
                self.dc_blockers[index].process(filtered, src);
                self.oversamplers[index].upsample(upsampled, filtered);
            }
            Coupling::Dc => self.oversamplers[index].upsample(upsampled, src),
        }
    }

    fn acquire_xy<S: StreamSink + ?Sized>(
        &mut self,
        buffers: &mut ChannelBuffers<'_>,
        x: &[f32],
        y: &[f32],
        sink: &mut S,
        stats: &mut FlushStats,
    ) {
        let WorkBuffers {
            temp,
            x: data_x,
            y: data_y,
            ..
        } = &mut buffers.work;
        self.couple(Input::X, temp, data_x, x);
        self.couple(Input::Y, temp, data_y, y);

        let total = y.len() * self.oversampling.ratio();
        let display = &mut buffers.display;
        let mut done = 0;
        while done < total {
            let room = self.xy_record_size.saturating_sub(self.display_head);
            if room == 0 {
                self.flush(display, sink, stats);
                continue;
            }

            let count = room.min(total - done);
            let head = self.display_head;
            let span = head..head + count;
            display.x[span.clone()].copy_from_slice(&data_x[done..done + count]);
            display.y[span.clone()].copy_from_slice(&data_y[done..done + count]);
            display.strobe[span].fill(0.0);
            if head == 0 {
                display.strobe[0] = 1.0;
            }

            self.display_head += count;
            done += count;
        }
    }

    fn acquire_triggered<S: StreamSink + ?Sized>(
        &mut self,
        buffers: &mut ChannelBuffers<'_>,
        y: &[f32],
        ext: &[f32],
        sink: &mut S,
        stats: &mut FlushStats,
    ) {
        let total = y.len() * self.oversampling.ratio();
        {
            let WorkBuffers {
                temp,
                y: data_y,
                ext: data_ext,
                y_delay,
                ..
            } = &mut buffers.work;
            self.couple(Input::Y, temp, data_y, y);
            self.delay.process(&mut y_delay[..total], &data_y[..total]);
            self.couple(Input::Ext, temp, data_ext, ext);
        }

        let ChannelBuffers { work, display } = buffers;
        let source: &[f32] = match self.trigger_input {
            TriggerInput::Y => &work.y[..total],
            TriggerInput::Ext => &work.ext[..total],
        };
        let delayed: &[f32] = &work.y_delay[..total];

        self.data_head = 0;
        for (n, &sample) in source.iter().enumerate() {
            let fired = self.trigger.process_sample(sample) == TriggerState::Fired;

            if self.state == AcquisitionState::Listening {
                let start = fired || (self.auto_sweep && self.auto_sweep_elapsed());
                if !start {
                    continue;
                }
                self.sweep.reset_phase();
                self.auto_sweep_counter = 0;
                self.display_head = 0;
                self.data_head = n;
                self.state = AcquisitionState::Sweeping;
                self.sweep_step(display, delayed, 1.0);
            } else {
                self.sweep_step(display, delayed, 0.0);
            }

            if self.display_head >= self.sweep_size {
                self.flush(display, sink, stats);
                self.state = AcquisitionState::Listening;
            }
        }
    }

    /// Compare-then-increment: fires once the counter has reached the limit.
    fn auto_sweep_elapsed(&mut self) -> bool {
        let elapsed = self.auto_sweep_counter >= self.auto_sweep_limit;
        self.auto_sweep_counter += 1;
        elapsed
    }

    #[inline]
    fn sweep_step(&mut self, display: &mut DisplayBuffers<'_>, delayed: &[f32], strobe: f32) {
        let head = self.display_head;
        display.x[head] = self.sweep.next_sample();
        display.y[head] = delayed[self.data_head];
        display.strobe[head] = strobe;
        self.data_head += 1;
        self.display_head += 1;
    }

    /// Renders the accumulated window into the sink and refreshes the preview.
    /// Frozen channels drop the window without touching either.
    fn flush<S: StreamSink + ?Sized>(
        &mut self,
        display: &mut DisplayBuffers<'_>,
        sink: &mut S,
        stats: &mut FlushStats,
    ) {
        let len = std::mem::take(&mut self.display_head);
        stats.windows += 1;
        if self.flags.frozen {
            return;
        }

        if std::mem::take(&mut self.clear_stream) {
            sink.clear();
        }

        let x = &mut display.x[..len];
        let y = &mut display.y[..len];
        let strobe = &mut display.strobe[..len];
        if self.mode == ScopeMode::Goniometer {
            lr_to_ms(y, x);
        }

        let kept = render::decimate(x, y, strobe, DECIMATION_THRESHOLD);
        self.vertical.apply(&mut y[..kept]);
        if self.mode != ScopeMode::Triggered {
            self.horizontal.apply(&mut x[..kept]);
        }

        stats.frames += render::emit_frames(sink, &x[..kept], &y[..kept], &strobe[..kept]);
        stats.flushes += 1;
        stats.points += kept;

        if kept > 0 {
            self.preview_len = render::decimate_into(
                &x[..kept],
                &y[..kept],
                display.preview_x,
                display.preview_y,
                PREVIEW_THRESHOLD,
            );
        }
    }
}
