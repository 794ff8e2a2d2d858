//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via KWIRE_CONFIG or --config)
//! 3. Environment variables

use kwire_protocol::CodecConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Client id written into request headers when none is configured.
pub const DEFAULT_CLIENT_ID: &str = "kwire";

/// Inspector configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Codec settings.
    pub codec: CodecConfig,
    /// Client id for encoded requests.
    pub client_id: Option<String>,
}

impl Config {
    /// Loads configuration from `path` if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Writes this configuration to `path`, refusing to replace an existing
    /// file unless `force` is set.
    pub fn init(&self, path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::Exists(path.to_path_buf()));
        }
        self.save(path)
    }

    /// Returns the configured client id or the default.
    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(client_id) = var("KWIRE_CLIENT_ID") {
            self.client_id = Some(client_id);
        }

        if let Some(verify) = var("KWIRE_VERIFY_CRC") {
            self.codec.verify_crc = verify == "1" || verify.to_lowercase() == "true";
        }

        if let Some(size) = var("KWIRE_MAX_FRAME_SIZE") {
            match size.parse() {
                Ok(n) => self.codec.max_frame_size = n,
                Err(_) => tracing::warn!("Ignoring invalid KWIRE_MAX_FRAME_SIZE: {}", size),
            }
        }

        if let Some(version) = var("KWIRE_API_VERSION") {
            match version.parse() {
                Ok(v) => self.codec.default_api_version = v,
                Err(_) => tracing::warn!("Ignoring invalid KWIRE_API_VERSION: {}", version),
            }
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    Parse(PathBuf, String),

    #[error("config file '{}' already exists (use --force to overwrite)", .0.display())]
    Exists(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.codec, CodecConfig::default());
        assert_eq!(config.client_id(), "kwire");
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "client_id: inspector\ncodec:\n  verify_crc: true").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.client_id(), "inspector");
        assert!(config.codec.verify_crc);
        assert_eq!(
            config.codec.max_frame_size,
            CodecConfig::default().max_frame_size
        );
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "codec: [not, a, map]").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(..)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kwire.yaml");
        let config = Config {
            codec: CodecConfig::default().with_max_frame_size(4096),
            client_id: Some("saved".to_string()),
        };
        config.save(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_init_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kwire.yaml");
        let first = Config {
            client_id: Some("first".to_string()),
            ..Config::default()
        };
        first.init(&path, false).unwrap();

        let second = Config {
            client_id: Some("second".to_string()),
            ..Config::default()
        };
        let err = second.init(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::Exists(ref p) if p == &path));
        assert_eq!(Config::from_file(&path).unwrap(), first);

        second.init(&path, true).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), second);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[
            ("KWIRE_CLIENT_ID", "env-client"),
            ("KWIRE_VERIFY_CRC", "TRUE"),
            ("KWIRE_MAX_FRAME_SIZE", "1024"),
            ("KWIRE_API_VERSION", "1"),
        ]));
        assert_eq!(config.client_id(), "env-client");
        assert!(config.codec.verify_crc);
        assert_eq!(config.codec.max_frame_size, 1024);
        assert_eq!(config.codec.default_api_version, 1);
    }

    #[test]
    fn test_invalid_env_values_ignored() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[
            ("KWIRE_MAX_FRAME_SIZE", "lots"),
            ("KWIRE_API_VERSION", "-x"),
        ]));
        assert_eq!(config.codec, CodecConfig::default());
    }
}
