// config.rs

use crate::playback::PollSettings;
use ::config::{Config, ConfigError, Environment, File};
use log::{debug, LevelFilter};
use std::path::Path;
use std::time::Duration;

/// Settings file looked up in the working directory when no path is given
pub const DEFAULT_SETTINGS_FILE: &str = "playmidi.toml";
pub const ENV_PREFIX: &str = "PLAYMIDI";

pub const DEFAULT_POLL_INTERVAL_MS: i64 = 1;
pub const DEFAULT_STALL_TIMEOUT_MS: i64 = 5_000;
pub const DEFAULT_CLIENT_NAME: &str = "playmidi";
pub const DEFAULT_LOG_LEVEL: &str = "debug";
pub const DEFAULT_SYNTH_GAIN: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub poll_interval: Duration,
    pub stall_timeout: Duration,
    /// Name midir registers the client and its connections under
    pub client_name: String,
    pub log_level: LevelFilter,
    pub synth_gain: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS as u64),
            stall_timeout: Duration::from_millis(DEFAULT_STALL_TIMEOUT_MS as u64),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            log_level: LevelFilter::Debug,
            synth_gain: DEFAULT_SYNTH_GAIN as f32,
        }
    }
}

impl Settings {
    /// Defaults, then the settings file, then `PLAYMIDI_*` environment variables.
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let source = Config::builder()
            .set_default("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS)?
            .set_default("stall_timeout_ms", DEFAULT_STALL_TIMEOUT_MS)?
            .set_default("client_name", DEFAULT_CLIENT_NAME)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("synth_gain", DEFAULT_SYNTH_GAIN)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Self::from_config(&source)
    }

    fn from_config(source: &Config) -> Result<Self, ConfigError> {
        let poll_interval_ms = source.get_int("poll_interval_ms")?;
        if poll_interval_ms < 1 {
            return Err(ConfigError::Message(format!(
                "poll_interval_ms must be at least 1, got {}",
                poll_interval_ms
            )));
        }

        let stall_timeout_ms = source.get_int("stall_timeout_ms")?;
        if stall_timeout_ms < poll_interval_ms {
            return Err(ConfigError::Message(format!(
                "stall_timeout_ms ({}) must not be shorter than poll_interval_ms ({})",
                stall_timeout_ms, poll_interval_ms
            )));
        }

        let client_name = source.get_string("client_name")?;
        if client_name.trim().is_empty() {
            return Err(ConfigError::Message("client_name must not be empty".to_string()));
        }

        let log_level_raw = source.get_string("log_level")?;
        let log_level = log_level_raw.parse::<LevelFilter>().map_err(|_| {
            ConfigError::Message(format!("unknown log_level '{}'", log_level_raw))
        })?;

        let synth_gain = source.get_float("synth_gain")?;
        if !(0.0..=1.0).contains(&synth_gain) {
            return Err(ConfigError::Message(format!(
                "synth_gain must be between 0 and 1, got {}",
                synth_gain
            )));
        }

        let settings = Settings {
            poll_interval: Duration::from_millis(poll_interval_ms as u64),
            stall_timeout: Duration::from_millis(stall_timeout_ms as u64),
            client_name,
            log_level,
            synth_gain: synth_gain as f32,
        };
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            stall_timeout: self.stall_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::FileFormat;

    fn from_toml(text: &str) -> Result<Settings, ConfigError> {
        let source = Config::builder()
            .set_default("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS)?
            .set_default("stall_timeout_ms", DEFAULT_STALL_TIMEOUT_MS)?
            .set_default("client_name", DEFAULT_CLIENT_NAME)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("synth_gain", DEFAULT_SYNTH_GAIN)?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Settings::from_config(&source)
    }

    #[test]
    fn test_defaults() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_settings(), PollSettings::default());
    }

    #[test]
    fn test_overrides_from_file() {
        let settings = from_toml(
            "poll_interval_ms = 5\nstall_timeout_ms = 250\nclient_name = \"pim\"\nlog_level = \"warn\"\nsynth_gain = 0.5\n",
        )
        .unwrap();
        assert_eq!(settings.poll_interval, Duration::from_millis(5));
        assert_eq!(settings.stall_timeout, Duration::from_millis(250));
        assert_eq!(settings.client_name, "pim");
        assert_eq!(settings.log_level, LevelFilter::Warn);
        assert_eq!(settings.synth_gain, 0.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(from_toml("poll_interval_ms = 0").is_err());
        assert!(from_toml("stall_timeout_ms = 0").is_err());
        assert!(from_toml("log_level = \"chatty\"").is_err());
        assert!(from_toml("synth_gain = 3.0").is_err());
        assert!(from_toml("client_name = \"  \"").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/playmidi.toml"))).is_err());
    }
}
