//! Frame-oriented output stream shared with the display side.

use serde::Serialize;

/// Channels carried by every frame: horizontal, vertical and strobe.
pub const STREAM_CHANNELS: usize = 3;
pub const DEFAULT_FRAME_CAPACITY: usize = 4_096;
pub const DEFAULT_FRAME_SLOTS: usize = 64;

/// Destination for rendered sweeps. Each frame is opened with
/// [`StreamSink::begin_frame`], filled per channel, then committed.
pub trait StreamSink {
    /// Opens a frame for up to `requested` points and returns how many the
    /// sink accepts. Zero means the sink cannot take anything right now.
    fn begin_frame(&mut self, requested: usize) -> usize;
    /// Copies `data[..count]` into `channel` of the open frame starting at `offset`.
    fn write_channel(&mut self, channel: usize, data: &[f32], offset: usize, count: usize);
    fn commit_frame(&mut self);
    /// Discards anything the reader has not consumed yet.
    fn clear(&mut self);
}

/// Preallocated ring of frame slots. Readers poll by frame id; anything
/// older than the ring depth is gone.
#[derive(Debug, Clone)]
pub struct FrameStream {
    frame_capacity: usize,
    slots: usize,
    data: Vec<f32>,
    lengths: Vec<usize>,
    committed: u64,
    open: usize,
    generation: u64,
}

impl Default for FrameStream {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY, DEFAULT_FRAME_SLOTS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame<'a> {
    pub id: u64,
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub strobe: &'a [f32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub frames: u64,
    pub generation: u64,
    pub frame_capacity: usize,
    pub slots: usize,
}

impl FrameStream {
    pub fn new(frame_capacity: usize, slots: usize) -> Self {
        let frame_capacity = frame_capacity.max(1);
        let slots = slots.max(1);
        Self {
            frame_capacity,
            slots,
            data: vec![0.0; STREAM_CHANNELS * frame_capacity * slots],
            lengths: vec![0; slots],
            committed: 0,
            open: 0,
            generation: 0,
        }
    }

    /// Id the next committed frame will carry.
    pub fn frame_id(&self) -> u64 {
        self.committed
    }

    /// Bumped on every [`StreamSink::clear`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            frames: self.committed,
            generation: self.generation,
            frame_capacity: self.frame_capacity,
            slots: self.slots,
        }
    }

    pub fn frame(&self, id: u64) -> Option<Frame<'_>> {
        if id >= self.committed || self.committed - id > self.slots as u64 {
            return None;
        }
        let slot = (id % self.slots as u64) as usize;
        Some(Frame {
            id,
            x: self.slot_channel(slot, 0),
            y: self.slot_channel(slot, 1),
            strobe: self.slot_channel(slot, 2),
        })
    }

    pub fn latest(&self) -> Option<Frame<'_>> {
        self.committed.checked_sub(1).and_then(|id| self.frame(id))
    }

    fn slot_channel(&self, slot: usize, channel: usize) -> &[f32] {
        let start = self.channel_start(slot, channel);
        &self.data[start..start + self.lengths[slot]]
    }

    fn channel_start(&self, slot: usize, channel: usize) -> usize {
        (slot * STREAM_CHANNELS + channel) * self.frame_capacity
    }

    fn open_slot(&self) -> usize {
        (self.committed % self.slots as u64) as usize
    }
}

impl StreamSink for FrameStream {
    fn begin_frame(&mut self, requested: usize) -> usize {
        self.open = requested.min(self.frame_capacity);
        let slot = self.open_slot();
        self.lengths[slot] = self.open;
        self.open
    }

    fn write_channel(&mut self, channel: usize, data: &[f32], offset: usize, count: usize) {
        if channel >= STREAM_CHANNELS || offset >= self.open {
            return;
        }
        let count = count.min(data.len()).min(self.open - offset);
        let start = self.channel_start(self.open_slot(), channel) + offset;
        self.data[start..start + count].copy_from_slice(&data[..count]);
    }

    fn commit_frame(&mut self) {
        self.committed += 1;
        self.open = 0;
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.lengths.fill(0);
        self.open = 0;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::StreamSink;

    /// Sink that keeps every committed frame, optionally capping grants.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub frames: Vec<[Vec<f32>; 3]>,
        pub clears: usize,
        pub max_grant: Option<usize>,
        open: Option<[Vec<f32>; 3]>,
    }

    impl RecordingSink {
        pub fn with_max_grant(max_grant: usize) -> Self {
            Self {
                max_grant: Some(max_grant),
                ..Self::default()
            }
        }

        pub fn points(&self) -> usize {
            self.frames.iter().map(|frame| frame[0].len()).sum()
        }
    }

    impl StreamSink for RecordingSink {
        fn begin_frame(&mut self, requested: usize) -> usize {
            let granted = self.max_grant.map_or(requested, |cap| requested.min(cap));
            self.open = Some(std::array::from_fn(|_| vec![0.0; granted]));
            granted
        }

        fn write_channel(&mut self, channel: usize, data: &[f32], offset: usize, count: usize) {
            if let Some(frame) = self.open.as_mut() {
                frame[channel][offset..offset + count].copy_from_slice(&data[..count]);
            }
        }

        fn commit_frame(&mut self) {
            if let Some(frame) = self.open.take() {
                self.frames.push(frame);
            }
        }

        fn clear(&mut self) {
            self.clears += 1;
            self.frames.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(stream: &mut FrameStream, values: &[f32]) {
        let granted = stream.begin_frame(values.len());
        for channel in 0..STREAM_CHANNELS {
            stream.write_channel(channel, values, 0, granted);
        }
        stream.commit_frame();
    }

    #[test]
    fn frames_are_readable_until_overwritten() {
        let mut stream = FrameStream::new(8, 2);
        push(&mut stream, &[1.0, 2.0]);
        push(&mut stream, &[3.0]);
        assert_eq!(stream.frame(0).map(|f| f.x.to_vec()), Some(vec![1.0, 2.0]));
        assert_eq!(stream.latest().map(|f| f.y.to_vec()), Some(vec![3.0]));

        push(&mut stream, &[4.0, 5.0, 6.0]);
        assert!(stream.frame(0).is_none());
        assert_eq!(stream.frame(2).map(|f| f.strobe.len()), Some(3));
        assert!(stream.frame(3).is_none());
    }

    #[test]
    fn grant_is_capped_by_frame_capacity() {
        let mut stream = FrameStream::new(4, 2);
        assert_eq!(stream.begin_frame(10), 4);
        stream.write_channel(0, &[1.0; 10], 0, 10);
        stream.commit_frame();
        assert_eq!(stream.latest().map(|f| f.x.len()), Some(4));
    }

    #[test]
    fn clear_drops_unread_frames() {
        let mut stream = FrameStream::new(4, 4);
        push(&mut stream, &[1.0]);
        stream.clear();
        assert_eq!(stream.generation(), 1);
        assert_eq!(stream.latest().map(|f| f.x.len()), Some(0));
    }
}
