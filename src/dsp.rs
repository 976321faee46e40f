pub mod dc_block;
pub mod delay;
pub mod oversampler;
pub mod sweep;
pub mod trigger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorUpdate<T> {
    None,
    Snapshot(T),
}

impl<T> From<ProcessorUpdate<T>> for Option<T> {
    fn from(update: ProcessorUpdate<T>) -> Self {
        match update {
            ProcessorUpdate::Snapshot(s) => Some(s),
            ProcessorUpdate::None => None,
        }
    }
}

/// A block-rate stage that writes exactly `src.len()` samples into `dst`.
pub trait SampleProcessor {
    fn process(&mut self, dst: &mut [f32], src: &[f32]);
}

pub trait Reconfigurable<Cfg> {
    fn update_config(&mut self, config: Cfg);
}
