pub mod dsp;
pub mod error;
pub mod scope;
pub mod settings;
pub mod util;

pub use error::EngineError;
pub use scope::params::{ChannelLayout, ChannelParameters, Controls};
pub use scope::stream::{FrameStream, StreamSink};
pub use scope::{BlockReport, ChannelInput, ChannelOutput, Oscilloscope, Preview, ScopeBlock};
pub use settings::{ScopeSettings, SettingsError};
