//! Engine configuration file format.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use patchbay_core::{GraphLayout, Precision, PrepareSettings};

use crate::error::ConfigError;
use crate::validation::{ValidationResult, validate_engine};

/// Playback and resource settings for one processing graph.
///
/// Every field has a default, so a partial file only overrides what it names.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 48000.0
/// block_size = 512
/// precision = "single"      # or "double"
/// input_channels = 2
/// output_channels = 2
/// non_realtime = false
/// reclaim_interval_ms = 500
/// event_capacity = 512
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: f64,

    /// Largest block rendered without splitting.
    pub block_size: usize,

    /// Precision of the host's buffers.
    pub precision: Precision,

    /// Channels provided by the graph's audio input node.
    pub input_channels: usize,

    /// Channels collected by the graph's audio output node.
    pub output_channels: usize,

    /// Render offline, waiting for plans instead of outputting silence.
    pub non_realtime: bool,

    /// Period of the background thread dropping retired plans.
    pub reclaim_interval_ms: u64,

    /// Events each scratch MIDI buffer holds.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            block_size: 512,
            precision: Precision::Single,
            input_channels: 2,
            output_channels: 2,
            non_realtime: false,
            reclaim_interval_ms: 500,
            event_capacity: patchbay_core::DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_engine(self)
    }

    /// Settings to prepare the graph with.
    pub fn prepare_settings(&self) -> PrepareSettings {
        PrepareSettings::new(self.precision, self.sample_rate, self.block_size)
    }

    /// Channel counts for the graph's boundary nodes.
    pub fn layout(&self) -> GraphLayout {
        GraphLayout {
            inputs: self.input_channels,
            outputs: self.output_channels,
        }
    }

    /// Reclaim period as a [`Duration`].
    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_millis(self.reclaim_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml("block_size = 128\nprecision = \"double\"").unwrap();
        assert_eq!(config.block_size, 128);
        assert_eq!(config.precision, Precision::Double);
        assert_eq!(config.sample_rate, 48000.0);
        assert_eq!(config.output_channels, 2);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_out_of_range_is_rejected_on_parse() {
        let err = EngineConfig::from_toml("block_size = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "block_size"
        ));
    }

    #[test]
    fn test_unknown_precision_is_a_parse_error() {
        let err = EngineConfig::from_toml("precision = \"quad\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig {
            sample_rate: 96000.0,
            precision: Precision::Double,
            non_realtime: true,
            ..EngineConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("precision = \"double\""));
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_derived_settings() {
        let config = EngineConfig {
            input_channels: 1,
            output_channels: 4,
            block_size: 64,
            reclaim_interval_ms: 250,
            ..EngineConfig::default()
        };
        assert_eq!(config.layout(), GraphLayout { inputs: 1, outputs: 4 });
        assert_eq!(
            config.prepare_settings(),
            PrepareSettings::new(Precision::Single, 48000.0, 64)
        );
        assert_eq!(config.reclaim_interval(), Duration::from_millis(250));
    }
}
