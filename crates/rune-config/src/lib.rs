//! Rune motion configuration system
//!
//! Loads orchestrator settings from `rune.toml`, with environment variables
//! taking precedence over file values.

use rune_presence::{PresenceOptions, Stagger, StaggerDirection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "rune.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RuneConfig {
    /// Global motion settings
    pub motion: MotionConfig,
    /// Single-child boundary behavior
    pub presence: PresenceOptions,
    /// List group animations
    pub group: GroupConfig,
    /// Demo binary settings
    pub demo: DemoConfig,
}

/// Global motion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MotionConfig {
    /// Collapse every animation to zero duration
    pub reduced_motion: bool,
    /// Frame length used by the demo loop, in milliseconds
    pub frame_ms: f32,
}

/// List group configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupConfig {
    /// Delay between consecutive entering children
    pub stagger_ms: f32,
    /// Delay before the first entering child
    pub stagger_start_ms: f32,
    pub direction: StaggerDirection,
    pub enter_ms: f32,
    pub exit_ms: f32,
}

/// Demo application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of frames the scripted demo runs for
    pub frames: u32,
    /// `tracing` filter directive, e.g. "rune_presence=debug"
    pub log_filter: Option<String>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            reduced_motion: false,
            frame_ms: 16.0,
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            stagger_ms: 50.0,
            stagger_start_ms: 0.0,
            direction: StaggerDirection::Forward,
            enter_ms: 250.0,
            exit_ms: 200.0,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            log_filter: None,
        }
    }
}

impl GroupConfig {
    pub fn stagger(&self) -> Stagger {
        if self.stagger_ms == 0.0 && self.stagger_start_ms == 0.0 {
            Stagger::None
        } else {
            Stagger::Delay {
                each_ms: self.stagger_ms,
                start_ms: self.stagger_start_ms,
            }
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl RuneConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from the default location (rune.toml in the current directory)
    /// or return default configuration if file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_FILE).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    /// Unparseable numbers are ignored.
    pub fn merge_with_env(&mut self) {
        // Motion settings
        if let Ok(val) = std::env::var("RUNE_REDUCED_MOTION") {
            self.motion.reduced_motion = parse_bool(&val);
        }

        // Presence settings
        if let Ok(val) = std::env::var("RUNE_EXIT_BEFORE_ENTER") {
            self.presence.exit_before_enter = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("RUNE_PRESENCE_INITIAL") {
            self.presence.initial = parse_bool(&val);
        }

        // Group settings
        if let Ok(val) = std::env::var("RUNE_STAGGER_MS") {
            if let Ok(ms) = val.parse::<f32>() {
                self.group.stagger_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("RUNE_STAGGER_DIRECTION") {
            match val.to_ascii_lowercase().as_str() {
                "forward" => self.group.direction = StaggerDirection::Forward,
                "reverse" => self.group.direction = StaggerDirection::Reverse,
                "center" => self.group.direction = StaggerDirection::Center,
                _ => {}
            }
        }

        // Demo settings
        if let Ok(val) = std::env::var("RUNE_DEMO_FRAMES") {
            if let Ok(frames) = val.parse::<u32>() {
                self.demo.frames = frames;
            }
        }
        if let Ok(filter) = std::env::var("RUNE_LOG") {
            self.demo.log_filter = Some(filter);
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from rune.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RuneConfig::default();
        assert!(!config.motion.reduced_motion);
        assert_eq!(config.motion.frame_ms, 16.0);
        assert!(config.presence.initial);
        assert!(!config.presence.exit_before_enter);
        assert_eq!(config.group.direction, StaggerDirection::Forward);
    }

    #[test]
    fn test_toml_serialization() {
        let config = RuneConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RuneConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[presence]\nexit_before_enter = true\n\n[group]\nstagger_ms = 30.0\ndirection = \"center\""
        )
        .unwrap();

        let config = RuneConfig::load_from_file(file.path()).unwrap();
        assert!(config.presence.exit_before_enter);
        assert!(config.presence.initial);
        assert_eq!(config.group.stagger_ms, 30.0);
        assert_eq!(config.group.direction, StaggerDirection::Center);
        assert_eq!(config.group.exit_ms, 200.0);
        assert_eq!(config.demo.frames, 120);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            RuneConfig::load_from_file(&missing),
            Err(ConfigError::Io { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[motion\nreduced_motion = ").unwrap();
        let err = RuneConfig::load_from_file(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_group_stagger() {
        let mut group = GroupConfig::default();
        assert!(matches!(group.stagger(), Stagger::Delay { each_ms, .. } if each_ms == 50.0));
        group.stagger_ms = 0.0;
        assert!(matches!(group.stagger(), Stagger::None));
    }

    #[test]
    fn test_merge_with_env() {
        // Set environment variable
        unsafe {
            std::env::set_var("RUNE_EXIT_BEFORE_ENTER", "true");
            std::env::set_var("RUNE_STAGGER_DIRECTION", "Reverse");
            std::env::set_var("RUNE_DEMO_FRAMES", "not-a-number");
        }

        let mut config = RuneConfig::default();
        config.merge_with_env();

        assert!(config.presence.exit_before_enter);
        assert_eq!(config.group.direction, StaggerDirection::Reverse);
        assert_eq!(config.demo.frames, 120);

        // Clean up
        unsafe {
            std::env::remove_var("RUNE_EXIT_BEFORE_ENTER");
            std::env::remove_var("RUNE_STAGGER_DIRECTION");
            std::env::remove_var("RUNE_DEMO_FRAMES");
        }
    }
}
