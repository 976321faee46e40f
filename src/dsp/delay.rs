//! Fixed-capacity delay line for pre-trigger buffering.

use super::SampleProcessor;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DelayLine {
    #[serde(skip)]
    buffer: Vec<f32>,
    head: usize,
    delay: usize,
    capacity: usize,
}

impl DelayLine {
    /// Allocates storage for delays up to `capacity` samples. This is the only allocation.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity + 1],
            head: 0,
            delay: 0,
            capacity,
        }
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Requests beyond capacity are clamped.
    pub fn set_delay(&mut self, delay: usize) {
        self.delay = delay.min(self.capacity);
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.head = 0;
    }
}

impl SampleProcessor for DelayLine {
    fn process(&mut self, dst: &mut [f32], src: &[f32]) {
        debug_assert!(dst.len() >= src.len());
        let len = self.buffer.len();
        for (out, &x) in dst.iter_mut().zip(src) {
            self.buffer[self.head] = x;
            *out = self.buffer[(self.head + len - self.delay) % len];
            self.head = (self.head + 1) % len;
        }
    }
}
