use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::Activity;
use crate::queue::QueueKind;

pub const DEFAULT_CONFIG_PATH: &str = "fairplay.toml";
pub const ENV_PREFIX: &str = "FAIRPLAY";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("status_interval_secs must be greater than zero")]
    ZeroStatusInterval,

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Show the playing track as the bot's presence while it plays in at
    /// most one guild.
    pub song_in_status: bool,
    /// Now-playing messages carry images and are not edited periodically.
    pub np_images: bool,
    /// Default presence, e.g. `"playing music"`. `"none"` clears it.
    pub game: String,
    pub queue_type: QueueKind,
    pub status_interval_secs: u64,
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            song_in_status: false,
            np_images: false,
            game: "none".to_string(),
            queue_type: QueueKind::default(),
            status_interval_secs: 5,
            log_level: "info".to_string(),
        }
    }
}

impl BotConfig {
    /// Layers the TOML file (if any) under `FAIRPLAY_*` environment variables.
    /// An explicitly given file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_layered(path, None)
    }

    /// `env` stands in for the process environment when given.
    fn load_layered(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let (file, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        let settings = config::Config::builder()
            .add_source(
                config::File::from(file)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;
        Self::from_settings(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self, ConfigError> {
        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status_interval_secs == 0 {
            return Err(ConfigError::ZeroStatusInterval);
        }
        Ok(())
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn default_activity(&self) -> Option<Activity> {
        Activity::parse_setting(&self.game)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
