//! JSON settings file: instance shape, stream sizing and initial control values.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::EngineError;
use crate::scope::Oscilloscope;
use crate::scope::params::{
    ChannelControls, ChannelLayout, ChannelParameters, Controls, XY_RECORD_TIME,
};
use crate::scope::stream::{DEFAULT_FRAME_CAPACITY, DEFAULT_FRAME_SLOTS, FrameStream};
use crate::util::audio::DEFAULT_SAMPLE_RATE;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub frame_capacity: usize,
    pub frames: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            frames: DEFAULT_FRAME_SLOTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSettings {
    pub sample_rate: f32,
    pub channels: usize,
    pub freeze: bool,
    pub xy_record_time: f32,
    pub global: ChannelParameters,
    pub channel: Vec<ChannelControls>,
    pub stream: StreamSettings,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            freeze: false,
            xy_record_time: XY_RECORD_TIME.default,
            global: ChannelParameters::default(),
            channel: Vec::new(),
            stream: StreamSettings::default(),
        }
    }
}

/// `$XDG_CONFIG_HOME/openscope/settings.json`, falling back to `~/.config`.
pub fn default_path() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("openscope")
        .join("settings.json")
}

impl ScopeSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Self =
            serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.sanitize();
        Ok(settings)
    }

    /// Missing files are silent; unreadable or malformed ones are logged.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(SettingsError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(err) => {
                warn!("[settings] {err}");
                Self::default()
            }
        }
    }

    /// Writes through a temporary file so readers never see a partial document.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source: std::io::Error| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| write_err(source.into()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(write_err)?;
        fs::rename(&temp_path, path).map_err(write_err)
    }

    pub fn sanitize(&mut self) {
        if !self.sample_rate.is_finite() || self.sample_rate < 1.0 {
            warn!("[settings] invalid sample rate {}, using default", self.sample_rate);
            self.sample_rate = DEFAULT_SAMPLE_RATE;
        }
        if ChannelLayout::from_channels(self.channels).is_none() {
            warn!("[settings] unsupported channel count {}, using 1", self.channels);
            self.channels = 1;
        }
        self.xy_record_time = XY_RECORD_TIME.clamp(self.xy_record_time);
        self.global = self.global.sanitized();
        self.channel.resize(self.channels, ChannelControls::default());
        for controls in &mut self.channel {
            controls.parameters = controls.parameters.sanitized();
        }
        self.stream.frame_capacity = self.stream.frame_capacity.max(1);
        self.stream.frames = self.stream.frames.max(1);
    }

    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout::from_channels(self.channels).unwrap_or(ChannelLayout::X1)
    }

    pub fn controls(&self) -> Controls {
        Controls::from_settings(self)
    }

    pub fn build(&self) -> Result<Oscilloscope<FrameStream>, EngineError> {
        let sinks = (0..self.layout().channels())
            .map(|_| FrameStream::new(self.stream.frame_capacity, self.stream.frames))
            .collect();
        let mut scope = Oscilloscope::with_sinks(self.sample_rate, sinks)?;
        scope.update_settings(&self.controls());
        Ok(scope)
    }
}

impl Controls {
    /// Initial control snapshot described by a settings file.
    pub fn from_settings(settings: &ScopeSettings) -> Self {
        let mut controls = Controls::new(settings.layout());
        controls.freeze = settings.freeze;
        controls.xy_record_time = settings.xy_record_time;
        controls.global = settings.global;
        for (dst, src) in controls.channels.iter_mut().zip(&settings.channel) {
            *dst = *src;
        }
        controls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::params::{ScopeMode, TIME_DIVISION};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_document_fills_defaults() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "channels": 2, "channel": [{{ "parameters": {{ "mode": "xy", "time_division": 900 }} }}] }}"#
        )
        .expect("write");

        let settings = ScopeSettings::load(file.path()).expect("load");
        assert_eq!(settings.layout(), ChannelLayout::X2);
        assert_eq!(settings.channel.len(), 2);
        assert_eq!(settings.channel[0].parameters.mode, ScopeMode::Xy);
        assert_eq!(settings.channel[0].parameters.time_division, TIME_DIVISION.max);
        assert_eq!(settings.channel[1], ChannelControls::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write");
        assert!(matches!(
            ScopeSettings::load(file.path()),
            Err(SettingsError::Parse { .. })
        ));
        assert_eq!(ScopeSettings::load_or_default(file.path()), ScopeSettings::default());
    }

    #[test]
    fn unsupported_channel_count_is_replaced() {
        let mut settings = ScopeSettings {
            channels: 3,
            sample_rate: f32::NAN,
            ..Default::default()
        };
        settings.sanitize();
        assert_eq!(settings.channels, 1);
        assert_eq!(settings.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = ScopeSettings {
            channels: 4,
            freeze: true,
            ..Default::default()
        };
        settings.sanitize();
        settings.channel[2].switches.solo = true;
        settings.save(&path).expect("save");

        let loaded = ScopeSettings::load(&path).expect("load");
        assert_eq!(loaded, settings);
        let controls = loaded.controls();
        assert!(controls.freeze);
        assert!(controls.channels[2].switches.solo);
    }

    #[test]
    fn save_failure_reports_the_target_path() {
        let blocker = NamedTempFile::new().expect("temp file");
        let path = blocker.path().join("settings.json");

        let err = ScopeSettings::default().save(&path).expect_err("parent is a file");
        assert!(matches!(&err, SettingsError::Write { path: p, .. } if *p == path));
        assert!(err.to_string().starts_with("failed to write"));
    }
}
