//! Configuration file handling for led-mapper.
//!
//! Loads configuration from `~/.config/led-mapper/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file structure for led-mapper.
/// Loaded from ~/.config/led-mapper/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct ControllerConfig {
    /// Controller host or host:port
    pub address: Option<String>,
    /// Override for the LED count instead of asking the controller
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CameraConfig {
    #[serde(default)]
    pub device: u32,
    /// Capture resolution as "WIDTHxHEIGHT"
    pub resolution: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MappingConfig {
    /// Settle delay between light command and capture, in milliseconds
    pub settle_ms: Option<u64>,
    /// Master brightness during mapping
    pub brightness: Option<u8>,
    /// Save every overlay frame for offline inspection
    #[serde(default)]
    pub save_frames: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Directory artifacts are written into
    pub dir: Option<PathBuf>,
    /// Ledmap name (the "n" field of the JSON document)
    pub name: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    directories::ProjectDirs::from("com", "led-mapper", "led-mapper")
        .map(|d| d.config_dir().to_path_buf().join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/led-mapper/config.toml")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [controller]
            address = "192.168.1.50"
            count = 100

            [camera]
            device = 1
            resolution = "1280x720"

            [mapping]
            settle_ms = 350
            brightness = 200
            save_frames = true

            [output]
            dir = "maps"
            name = "livingroom"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.controller.address.as_deref(), Some("192.168.1.50"));
        assert_eq!(config.controller.count, Some(100));
        assert_eq!(config.camera.device, 1);
        assert_eq!(config.mapping.settle_ms, Some(350));
        assert_eq!(config.mapping.brightness, Some(200));
        assert!(config.mapping.save_frames);
        assert_eq!(config.output.name.as_deref(), Some("livingroom"));
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.controller.address.is_none());
        assert_eq!(config.camera.device, 0);
        assert!(!config.mapping.save_frames);
        assert!(config.output.dir.is_none());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/led-mapper.toml"))).unwrap();
        assert!(config.controller.address.is_none());
    }

    #[test]
    fn test_load_invalid_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml = = =").unwrap();
        let result = Config::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_default_path_mentions_project() {
        let path = default_path();
        assert!(path.to_string_lossy().contains("led-mapper"));
    }
}
