use crate::{ConfigError, CoreError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

/// How the QA client picks a backend mode before asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStrategy {
    /// Skip the quota check and send a plain query.
    Disabled,
    /// Thinking mode when it has capacity, otherwise primary.
    #[default]
    PreferThinking,
    /// Primary mode only.
    PrimaryOnly,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Minutes between cycles; also the look-back window.
    pub interval: u64,
    /// Maximum posts handled per cycle.
    pub n: u32,
    pub subreddit: String,
    pub user_agent: String,
    pub reddit_timeout_secs: u64,
    pub backend_timeout_secs: u64,
    pub capacity_strategy: CapacityStrategy,
    /// Size of the seen-post set. Zero turns it off.
    pub seen_capacity: usize,
    pub query_prefix: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            interval: 10,
            n: 10,
            subreddit: "PESU".to_string(),
            user_agent: "pesudevbot".to_string(),
            reddit_timeout_secs: 30,
            backend_timeout_secs: 120,
            capacity_strategy: CapacityStrategy::default(),
            seen_capacity: 1000,
            query_prefix: None,
        }
    }
}

impl BotConfig {
    /// Reads the TOML file at `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        info!(
            "Loaded config from {}: interval={}m n={} subreddit=r/{}",
            path.display(),
            config.interval,
            config.n,
            config.subreddit
        );
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interval".to_string(),
                value: self.interval.to_string(),
            });
        }
        if self.n == 0 {
            return Err(ConfigError::InvalidValue {
                field: "n".to_string(),
                value: self.n.to_string(),
            });
        }
        if self.subreddit.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "subreddit".to_string(),
                value: self.subreddit.clone(),
            });
        }
        Ok(())
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval.saturating_mul(60))
    }

    pub fn reddit_timeout(&self) -> Duration {
        Duration::from_secs(self.reddit_timeout_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }
}

/// Secrets read from the process environment.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub ask_base_url: String,
}

impl Credentials {
    pub const CLIENT_ID: &'static str = "CLIENT_ID";
    pub const CLIENT_SECRET: &'static str = "CLIENT_SECRET";
    pub const USERNAME: &'static str = "REDDIT_USERNAME";
    pub const PASSWORD: &'static str = "REDDIT_PASSWORD";
    pub const ASK_BASE_URL: &'static str = "ASK_PESU_URL";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |var_name: &str| {
            lookup(var_name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                    var_name: var_name.to_string(),
                })
        };

        Ok(Self {
            client_id: require(Self::CLIENT_ID)?,
            client_secret: require(Self::CLIENT_SECRET)?,
            username: require(Self::USERNAME)?,
            password: require(Self::PASSWORD)?,
            ask_base_url: require(Self::ASK_BASE_URL)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ask_base_url", &self.ask_base_url)
            .finish()
    }
}
