//! Configuration file support.
//!
//! This module provides serialization and deserialization of editor settings:
//! logging, interaction thresholds, zoom factors and the render style.

use crate::constants::{style, threshold, zoom};
use crate::interaction::Tool;
use crate::model::CellLabel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Editor configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,

    /// Gesture thresholds and zoom factors
    #[serde(default)]
    pub interaction: InteractionConfig,

    /// Sizes and colors used by the renderer
    #[serde(default)]
    pub style: RenderStyle,
}

/// User preferences section of the config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Tool selected when the editor starts
    #[serde(default)]
    pub default_tool: Tool,

    /// Label assigned to new annotations until the user picks another
    #[serde(default)]
    pub default_label: CellLabel,
}

/// Thresholds for gesture disambiguation and zoom steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Image-pixel distance to the first vertex that closes a polygon
    pub polygon_close_distance: f64,
    /// Image-pixel radius around a point annotation that a delete click hits
    pub point_delete_radius: f64,
    /// Wheel factor for a positive wheel delta
    pub wheel_zoom_out: f64,
    /// Wheel factor for a zero or negative wheel delta
    pub wheel_zoom_in: f64,
    /// Toolbar zoom-in factor
    pub button_zoom_in: f64,
    /// Toolbar zoom-out factor
    pub button_zoom_out: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            polygon_close_distance: threshold::POLYGON_CLOSE,
            point_delete_radius: threshold::POINT_DELETE,
            wheel_zoom_out: zoom::WHEEL_OUT,
            wheel_zoom_in: zoom::WHEEL_IN,
            button_zoom_in: zoom::BUTTON_IN,
            button_zoom_out: zoom::BUTTON_OUT,
        }
    }
}

/// Renderer sizes, in viewport pixels at any zoom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    pub point_radius: f32,
    pub point_outline_width: f32,
    pub outline_width: f32,
    pub vertex_radius: f32,
    pub fill_alpha: u8,
    /// RGBA color behind the image
    pub background: [u8; 4],
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            point_radius: style::POINT_RADIUS,
            point_outline_width: style::POINT_OUTLINE_WIDTH,
            outline_width: style::OUTLINE_WIDTH,
            vertex_radius: style::VERTEX_RADIUS,
            fill_alpha: style::FILL_ALPHA,
            background: style::BACKGROUND,
        }
    }
}

impl EditorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: Preferences::default(),
            interaction: InteractionConfig::default(),
            style: RenderStyle::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.interaction.validate()?;
        Ok(config)
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "cellmark-config.json"
    }

    /// Get the default config file path for auto-load.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("cellmark").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("cellmark")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from an explicit path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to a path, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let factors = [
            ("wheel_zoom_out", self.wheel_zoom_out),
            ("wheel_zoom_in", self.wheel_zoom_in),
            ("button_zoom_in", self.button_zoom_in),
            ("button_zoom_out", self.button_zoom_out),
        ];
        for (name, value) in factors {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: name.to_string(),
                    message: format!("zoom factor must be positive, got {}", value),
                });
            }
        }
        for (name, value) in [
            ("polygon_close_distance", self.polygon_close_distance),
            ("point_delete_radius", self.point_delete_radius),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: name.to_string(),
                    message: format!("distance must be non-negative, got {}", value),
                });
            }
        }
        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A value is outside its allowed range
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trip() {
        let config = EditorConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(EditorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = EditorConfig::from_json(r#"{"version": 1}"#).unwrap();
        assert_eq!(config.interaction.polygon_close_distance, 10.0);
        assert_eq!(config.interaction.point_delete_radius, 15.0);
        assert_eq!(config.preferences.default_tool, Tool::Pan);
        assert_eq!(config.preferences.default_label, CellLabel::Lymphocyte);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = EditorConfig::from_json(
            r#"{"version": 1, "interaction": {"point_delete_radius": 20.0}, "preferences": {"log_level": "debug", "default_label": "tumor"}}"#,
        )
        .unwrap();
        assert_eq!(config.interaction.point_delete_radius, 20.0);
        assert_eq!(config.interaction.wheel_zoom_in, 1.1);
        assert_eq!(config.preferences.log_level, LogLevel::Debug);
        assert_eq!(config.preferences.default_label, CellLabel::Tumor);
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = EditorConfig::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(err, ConfigError::VersionTooNew { file_version: 99, .. }));
    }

    #[test]
    fn test_non_positive_zoom_factor_rejected() {
        let err = EditorConfig::from_json(r#"{"version": 1, "interaction": {"button_zoom_in": 0.0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
    }
}
