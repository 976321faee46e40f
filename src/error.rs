use std::collections::TryReserveError;
use thiserror::Error;

/// Failures raised while constructing or inspecting an engine.
/// Nothing on the audio path returns these.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported channel count {0}; expected 1, 2 or 4")]
    UnsupportedChannels(usize),

    #[error("failed to reserve {requested} samples for the buffer arena: {source}")]
    Allocation {
        requested: usize,
        source: TryReserveError,
    },

    #[error("failed to serialise engine state: {0}")]
    Dump(#[from] serde_json::Error),
}
