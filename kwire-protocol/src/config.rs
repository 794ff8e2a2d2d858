//! Codec configuration.

use crate::{DEFAULT_API_VERSION, DEFAULT_MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};

/// Settings shared by every encode and decode call of a [`crate::Codec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Api version written when a request does not set one.
    pub default_api_version: i16,
    /// Check message CRCs on decode.
    pub verify_crc: bool,
    /// Largest frame body accepted on decode or produced on encode.
    pub max_frame_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            default_api_version: DEFAULT_API_VERSION,
            verify_crc: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl CodecConfig {
    pub fn with_verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_default_api_version(mut self, version: i16) -> Self {
        self.default_api_version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CodecConfig::default();
        assert_eq!(config.default_api_version, 0);
        assert!(!config.verify_crc);
        assert_eq!(config.max_frame_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: CodecConfig = serde_json::from_str(r#"{"verify_crc": true}"#).unwrap();
        assert!(config.verify_crc);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }
}
