use wide::f32x8;

// Default sample rate (Hz) used throughout the pipeline.
// hosts always report the real rate through `update_sample_rate`,
// this exists mainly as a default during init and a fallback.
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

#[inline]
pub fn millis_to_samples(sample_rate: f32, millis: f32) -> usize {
    seconds_to_samples(sample_rate, millis * 1.0e-3)
}

#[inline]
pub fn seconds_to_samples(sample_rate: f32, seconds: f32) -> usize {
    let samples = f64::from(sample_rate) * f64::from(seconds);
    if samples.is_finite() && samples > 0.0 {
        samples.round() as usize
    } else {
        0
    }
}

// In-place affine map `v * scale + offset`, eight lanes at a time.
pub fn scale_offset(buffer: &mut [f32], scale: f32, offset: f32) {
    let (k, b) = (f32x8::splat(scale), f32x8::splat(offset));
    let mut chunks = buffer.chunks_exact_mut(8);
    for chunk in chunks.by_ref() {
        let mut lanes = [0.0f32; 8];
        lanes.copy_from_slice(chunk);
        let v = f32x8::from(lanes) * k + b;
        chunk.copy_from_slice(&v.to_array());
    }
    for sample in chunks.into_remainder() {
        *sample = *sample * scale + offset;
    }
}

// Rotate an L/R pair into mid/side: mid lands in `left`, side in `right`.
pub fn lr_to_ms(left: &mut [f32], right: &mut [f32]) {
    debug_assert_eq!(left.len(), right.len());
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        let (mid, side) = (0.5 * (*l + *r), 0.5 * (*l - *r));
        *l = mid;
        *r = side;
    }
}
