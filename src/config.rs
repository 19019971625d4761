//! Configuration file handling

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use g19::PollConfig;
use serde::{Deserialize, Serialize};

use crate::color::Color;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub polling: PollingConfig,
    pub display: DisplayConfig,
}

impl Config {
    /// Get the config file path for this platform
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "g19-driver").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load_or_create() -> Result<Self, Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let config = Config::default();
            config.save_with_header()?;
            Ok(config)
        }
    }

    /// Save config with header comments for new files
    pub fn save_with_header(&self) -> Result<(), Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = "# g19-driver configuration file\n\n";
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, format!("{header}{contents}"))?;
        Ok(())
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            read_timeout: self.polling.read_timeout,
            idle_sleep: self.polling.idle_sleep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Issue a bus reset to the lcd when opening the device
    pub reset_on_start: bool,
    /// Log filter directives, overridden by RUST_LOG
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            reset_on_start: false,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Upper bound for each key endpoint read
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Sleep after a poll cycle without any key data
    #[serde(with = "humantime_serde")]
    pub idle_sleep: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let defaults = PollConfig::default();
        Self {
            read_timeout: defaults.read_timeout,
            idle_sleep: defaults.idle_sleep,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display brightness applied on start (0-100)
    pub brightness: Option<u8>,
    /// Backlight color applied on start (hex)
    pub background_color: Option<Color>,
    /// Color filling the display on start (hex)
    pub fill_color: Option<Color>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("read_timeout = \"10ms\""), "{text}");
        assert_eq!(toml::from_str::<Config>(&text).unwrap(), config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r##"
            [polling]
            idle_sleep = "50ms"

            [display]
            brightness = 40
            background_color = "#ff8000"
            "##,
        )
        .unwrap();
        assert_eq!(config.polling.idle_sleep, Duration::from_millis(50));
        assert_eq!(config.polling.read_timeout, Duration::from_millis(10));
        assert_eq!(config.display.brightness, Some(40));
        assert_eq!(config.display.background_color, Some(Color([255, 128, 0])));
        assert_eq!(config.display.fill_color, None);
        assert_eq!(config.general, GeneralConfig::default());
        assert_eq!(config.poll_config().idle_sleep, Duration::from_millis(50));
    }

    #[test]
    fn invalid_color_is_rejected() {
        assert!(toml::from_str::<Config>("[display]\nfill_color = \"#12\"").is_err());
    }
}
