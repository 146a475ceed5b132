use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::bluetooth::DeviceAddress;
use crate::error::Result;
use crate::protocol::RFCOMM_CHANNEL;

/// Application configuration read from TOML. Never written back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Speaker Bluetooth address (`XX:XX:XX:XX:XX:XX`).
    #[serde(default)]
    pub device_address: Option<String>,
    /// RFCOMM channel.
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// How long queries wait for a reply, in seconds.
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

fn default_channel() -> u8 {
    RFCOMM_CHANNEL
}

fn default_reply_timeout() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_address: None,
            channel: default_channel(),
            reply_timeout_secs: default_reply_timeout(),
        }
    }
}

impl AppConfig {
    /// Config file path: ~/.config/boomx/config.toml
    pub fn path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("boomx");
        config_dir.join("config.toml")
    }

    /// Load config from disk, or return defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`. A missing, unreadable or invalid file
    /// yields defaults; the last two are logged.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match Self::from_toml_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
        }
        Self::default()
    }

    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The configured speaker address, if any.
    pub fn address(&self) -> Option<Result<DeviceAddress>> {
        self.device_address.as_deref().map(str::parse)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.channel, 2);
        assert_eq!(config.reply_timeout(), Duration::from_secs(5));
        assert!(config.address().is_none());
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml_str(r#"device_address = "aa:bb:cc:dd:ee:ff""#).unwrap();
        assert_eq!(config.channel, 2);
        let address = config.address().unwrap().unwrap();
        assert_eq!(address.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml_str(
            r#"
            device_address = "F8:AB:E5:00:11:22"
            channel = 4
            reply_timeout_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.channel, 4);
        assert_eq!(config.reply_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_bad_address_is_reported() {
        let config = AppConfig::from_toml_str(r#"device_address = "not-an-address""#).unwrap();
        assert!(config.address().unwrap().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "device_address = \"F8:AB:E5:00:11:22\"\nchannel = 3\n").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.device_address.as_deref(), Some("F8:AB:E5:00:11:22"));
        assert_eq!(config.channel, 3);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_invalid_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "channel = [not toml").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn test_load_unreadable_path_gives_defaults() {
        // A directory exists but cannot be read as a file
        let dir = tempdir().unwrap();
        assert_eq!(AppConfig::load_from(dir.path()), AppConfig::default());
    }

    #[test]
    fn test_wrong_type_fails() {
        assert!(AppConfig::from_toml_str("channel = \"two\"").is_err());
    }
}
