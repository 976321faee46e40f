//! Point decimation, display-space scaling and frame emission.

use serde::Serialize;

use super::stream::StreamSink;
use crate::util::audio::scale_offset;

pub const STREAM_MIN: f32 = -1.0;
pub const STREAM_MAX: f32 = 1.0;
/// Grid divisions across each axis of the stream.
pub const STREAM_DIVISIONS: f32 = 4.0;
/// Squared distance below which consecutive stream points merge.
pub const DECIMATION_THRESHOLD: f32 = 1.0e-6;
/// Coarser threshold for the inline preview.
pub const PREVIEW_THRESHOLD: f32 = 2.0e-3;

/// Affine map from signal units into the stream's `[-1, 1]` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisScale {
    pub scale: f32,
    pub offset: f32,
}

impl Default for AxisScale {
    fn default() -> Self {
        Self::from_division(0.5, 0.0)
    }
}

impl AxisScale {
    /// `division` is signal units per grid division, `position` is percent of half-screen.
    pub fn from_division(division: f32, position: f32) -> Self {
        let span = STREAM_MAX - STREAM_MIN;
        Self {
            scale: span / (STREAM_DIVISIONS * division),
            offset: 0.5 * span * (0.01 * position + 1.0) + STREAM_MIN,
        }
    }

    #[inline]
    pub fn map(self, value: f32) -> f32 {
        value * self.scale + self.offset
    }

    #[inline]
    pub fn unmap(self, value: f32) -> f32 {
        (value - self.offset) / self.scale
    }

    pub fn apply(self, buffer: &mut [f32]) {
        scale_offset(buffer, self.scale, self.offset);
    }
}

/// Drops points closer than `sqrt(threshold)` to the last kept one, in place.
/// A dropped point's strobe is folded into the kept point so sweep starts survive.
/// Returns the number of points kept at the head of the buffers.
pub fn decimate(x: &mut [f32], y: &mut [f32], strobe: &mut [f32], threshold: f32) -> usize {
    let len = x.len().min(y.len()).min(strobe.len());
    if len == 0 {
        return 0;
    }

    let mut kept = 0;
    for i in 1..len {
        let (dx, dy) = (x[i] - x[kept], y[i] - y[kept]);
        if dx * dx + dy * dy < threshold {
            strobe[kept] = strobe[kept].max(strobe[i]);
            continue;
        }
        kept += 1;
        x[kept] = x[i];
        y[kept] = y[i];
        strobe[kept] = strobe[i];
    }
    kept + 1
}

/// Same rule as [`decimate`] without strobes, writing into separate buffers.
pub fn decimate_into(
    src_x: &[f32],
    src_y: &[f32],
    dst_x: &mut [f32],
    dst_y: &mut [f32],
    threshold: f32,
) -> usize {
    let len = src_x
        .len()
        .min(src_y.len())
        .min(dst_x.len())
        .min(dst_y.len());
    if len == 0 {
        return 0;
    }

    dst_x[0] = src_x[0];
    dst_y[0] = src_y[0];
    let mut kept = 0;
    for i in 1..len {
        let (dx, dy) = (src_x[i] - dst_x[kept], src_y[i] - dst_y[kept]);
        if dx * dx + dy * dy < threshold {
            continue;
        }
        kept += 1;
        dst_x[kept] = src_x[i];
        dst_y[kept] = src_y[i];
    }
    kept + 1
}

/// Pushes the points as a sequence of frames, each no larger than the sink
/// grants. Stops early when the sink grants nothing. Returns frames committed.
pub fn emit_frames<S: StreamSink + ?Sized>(
    sink: &mut S,
    x: &[f32],
    y: &[f32],
    strobe: &[f32],
) -> usize {
    let total = x.len().min(y.len()).min(strobe.len());
    let mut offset = 0;
    let mut frames = 0;
    while offset < total {
        let remaining = total - offset;
        let count = sink.begin_frame(remaining).min(remaining);
        if count == 0 {
            break;
        }
        sink.write_channel(0, &x[offset..], 0, count);
        sink.write_channel(1, &y[offset..], 0, count);
        sink.write_channel(2, &strobe[offset..], 0, count);
        sink.commit_frame();
        offset += count;
        frames += 1;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::stream::testing::RecordingSink;

    #[test]
    fn decimation_keeps_first_point_and_merges_strobes() {
        let mut x = [0.0, 0.0, 0.5, 0.5, 1.0];
        let mut y = [0.0, 0.0, 0.0, 0.0, 0.0];
        let mut s = [0.0, 1.0, 0.0, 0.0, 0.0];
        let kept = decimate(&mut x, &mut y, &mut s, DECIMATION_THRESHOLD);
        assert_eq!(kept, 3);
        assert_eq!(&x[..kept], &[0.0, 0.5, 1.0]);
        assert_eq!(&s[..kept], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn decimation_is_idempotent() {
        let mut x: Vec<f32> = (0..200).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut y: Vec<f32> = (0..200).map(|i| (i as f32 * 0.013).cos()).collect();
        let mut s = vec![0.0; 200];
        let first = decimate(&mut x, &mut y, &mut s, PREVIEW_THRESHOLD);
        let (mut x2, mut y2, mut s2) = (x[..first].to_vec(), y[..first].to_vec(), s[..first].to_vec());
        let second = decimate(&mut x2, &mut y2, &mut s2, PREVIEW_THRESHOLD);
        assert_eq!(first, second);
        assert_eq!(&x[..first], &x2[..]);
    }

    #[test]
    fn decimated_neighbours_are_far_enough_apart() {
        let x: Vec<f32> = (0..500).map(|i| i as f32 * 1.0e-4).collect();
        let y = vec![0.0; 500];
        let mut dx = vec![0.0; 500];
        let mut dy = vec![0.0; 500];
        let kept = decimate_into(&x, &y, &mut dx, &mut dy, PREVIEW_THRESHOLD);
        assert!(kept < 500);
        for pair in dx[..kept].windows(2) {
            let d = pair[1] - pair[0];
            assert!(d * d >= PREVIEW_THRESHOLD);
        }
    }

    #[test]
    fn axis_scale_round_trips() {
        let scale = AxisScale::from_division(0.25, 40.0);
        for v in [-1.5, -0.2, 0.0, 0.7, 3.0] {
            assert!((scale.unmap(scale.map(v)) - v).abs() < 1e-5);
        }
        let centred = AxisScale::from_division(0.5, 0.0);
        assert_eq!(centred.scale, 1.0);
        assert_eq!(centred.offset, 0.0);
    }

    #[test]
    fn frames_respect_sink_grants() {
        let mut sink = RecordingSink::with_max_grant(4);
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let frames = emit_frames(&mut sink, &data, &data, &data);
        assert_eq!(frames, 3);
        assert_eq!(sink.points(), 10);
        assert_eq!(sink.frames[2][1], vec![8.0, 9.0]);
    }

    #[test]
    fn zero_grant_stops_emission() {
        let mut sink = RecordingSink::with_max_grant(0);
        let data = [1.0; 8];
        assert_eq!(emit_frames(&mut sink, &data, &data, &data), 0);
        assert!(sink.frames.is_empty());
    }
}
