//! One contiguous allocation carved into every per-channel working buffer.

use std::ops::Range;

use crate::error::EngineError;

/// Per-channel regions, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Region {
    Temp,
    DataX,
    DataY,
    DataExt,
    DataYDelay,
    DisplayX,
    DisplayY,
    DisplayStrobe,
    PreviewX,
    PreviewY,
}

pub const REGIONS_PER_CHANNEL: usize = 10;

/// Acquisition-side scratch: coupled/oversampled inputs and the delayed Y.
#[derive(Debug)]
pub struct WorkBuffers<'a> {
    pub temp: &'a mut [f32],
    pub x: &'a mut [f32],
    pub y: &'a mut [f32],
    pub ext: &'a mut [f32],
    pub y_delay: &'a mut [f32],
}

/// Accumulated display points and the preview copy.
#[derive(Debug)]
pub struct DisplayBuffers<'a> {
    pub x: &'a mut [f32],
    pub y: &'a mut [f32],
    pub strobe: &'a mut [f32],
    pub preview_x: &'a mut [f32],
    pub preview_y: &'a mut [f32],
}

#[derive(Debug)]
pub struct ChannelBuffers<'a> {
    pub work: WorkBuffers<'a>,
    pub display: DisplayBuffers<'a>,
}

impl<'a> ChannelBuffers<'a> {
    fn carve(mut slab: &'a mut [f32], region_len: usize) -> Self {
        let mut next = || take(&mut slab, region_len);
        let work = WorkBuffers {
            temp: next(),
            x: next(),
            y: next(),
            ext: next(),
            y_delay: next(),
        };
        let display = DisplayBuffers {
            x: next(),
            y: next(),
            strobe: next(),
            preview_x: next(),
            preview_y: next(),
        };
        Self { work, display }
    }
}

fn take<'a>(slab: &mut &'a mut [f32], len: usize) -> &'a mut [f32] {
    let (head, tail) = std::mem::take(slab).split_at_mut(len);
    *slab = tail;
    head
}

#[derive(Debug)]
pub struct BufferArena {
    storage: Vec<f32>,
    region_len: usize,
    channels: usize,
}

impl BufferArena {
    /// Reserves `channels * REGIONS_PER_CHANNEL * region_len` samples up front.
    pub fn allocate(channels: usize, region_len: usize) -> Result<Self, EngineError> {
        let region_len = region_len.max(1);
        let requested = channels
            .checked_mul(REGIONS_PER_CHANNEL)
            .and_then(|n| n.checked_mul(region_len))
            .unwrap_or(usize::MAX);

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(requested)
            .map_err(|source| EngineError::Allocation { requested, source })?;
        storage.resize(requested, 0.0);

        Ok(Self {
            storage,
            region_len,
            channels,
        })
    }

    fn stride(&self) -> usize {
        REGIONS_PER_CHANNEL * self.region_len
    }

    fn range(&self, channel: usize, region: Region) -> Range<usize> {
        let start = channel * self.stride() + region as usize * self.region_len;
        start..start + self.region_len
    }

    pub fn region(&self, channel: usize, region: Region) -> Option<&[f32]> {
        if channel >= self.channels {
            return None;
        }
        self.storage.get(self.range(channel, region))
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = ChannelBuffers<'_>> {
        let region_len = self.region_len;
        self.storage
            .chunks_exact_mut(REGIONS_PER_CHANNEL * region_len)
            .map(move |slab| ChannelBuffers::carve(slab, region_len))
    }
}
