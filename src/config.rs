//! Configuration module for feedcourier.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::{CourierError, Result};

/// Environment variable holding the Telegram bot token.
pub const ENV_BOT_TOKEN: &str = "FEEDCOURIER_TG_BOT_API_KEY";

/// Environment variable overriding the database URL.
pub const ENV_DATABASE_URL: &str = "FEEDCOURIER_DATABASE_URL";

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (sqlite://... or postgres://...).
    #[serde(default = "default_db_url")]
    pub url: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    /// Timeout applied to every store operation, in seconds.
    #[serde(default = "default_db_op_timeout")]
    pub op_timeout_secs: u64,
}

fn default_db_url() -> String {
    "sqlite://data/feedcourier.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_db_op_timeout() -> u64 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_db_max_connections(),
            op_timeout_secs: default_db_op_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file. Logs always go to stdout as well.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Scheduler and job queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity of the job queue between the scheduler and the worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Poll interval for sources that don't set their own, in seconds.
    #[serde(default = "default_update_interval")]
    pub default_update_interval_secs: u64,
    /// How far back a source with no watermark starts ingesting, in seconds.
    #[serde(default = "default_bootstrap_lookback")]
    pub bootstrap_lookback_secs: u64,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_update_interval() -> u64 {
    300 // 5 minutes
}

fn default_bootstrap_lookback() -> u64 {
    3600 // 1 hour
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            default_update_interval_secs: default_update_interval(),
            bootstrap_lookback_secs: default_bootstrap_lookback(),
        }
    }
}

/// Feed fetcher HTTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with feed requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    "feedcourier/0.1 (feed reader)".to_string()
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// FlareSolverr proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FlareSolverrConfig {
    /// Endpoint of the FlareSolverr API.
    #[serde(default = "default_flaresolverr_url")]
    pub url: String,
    /// Maximum time FlareSolverr may spend solving a page, in milliseconds.
    #[serde(default = "default_flaresolverr_max_timeout")]
    pub max_timeout_ms: u64,
    /// Ask the headless browser not to load images, CSS and fonts.
    #[serde(default = "default_disable_media")]
    pub disable_media: bool,
}

fn default_flaresolverr_url() -> String {
    "http://localhost:8191/v1".to_string()
}

fn default_flaresolverr_max_timeout() -> u64 {
    60_000
}

fn default_disable_media() -> bool {
    true
}

impl Default for FlareSolverrConfig {
    fn default() -> Self {
        Self {
            url: default_flaresolverr_url(),
            max_timeout_ms: default_flaresolverr_max_timeout(),
            disable_media: default_disable_media(),
        }
    }
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Usually supplied via `FEEDCOURIER_TG_BOT_API_KEY`.
    #[serde(default)]
    pub bot_token: String,
    /// Chat that receives notifications.
    #[serde(default)]
    pub chat_id: i64,
    /// Bot API base URL.
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Long-polling timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// A single feed source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// RSS/Atom feed URL.
    pub feed_url: String,
    /// Poll interval in seconds. Falls back to the scheduler default.
    #[serde(default)]
    pub update_interval_secs: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Feed fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// FlareSolverr configuration.
    #[serde(default)]
    pub flaresolverr: FlareSolverrConfig,
    /// Telegram configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Feed sources keyed by their unique name.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CourierError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CourierError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDCOURIER_TG_BOT_API_KEY`: Telegram bot token
    /// - `FEEDCOURIER_DATABASE_URL`: database connection URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(ENV_BOT_TOKEN) {
            if !token.is_empty() {
                self.telegram.bot_token = token;
            }
        }
        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
    }

    /// Effective poll interval for a source.
    pub fn update_interval(&self, source: &SourceConfig) -> Duration {
        Duration::from_secs(
            source
                .update_interval_secs
                .unwrap_or(self.scheduler.default_update_interval_secs),
        )
    }

    /// Validate the configuration.
    ///
    /// Every problem found here is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(CourierError::Validation(
                "at least one source must be configured under [sources]".to_string(),
            ));
        }

        for (name, source) in &self.sources {
            if name.trim().is_empty() {
                return Err(CourierError::Validation(
                    "source name must not be empty".to_string(),
                ));
            }
            let url = url::Url::parse(&source.feed_url).map_err(|e| {
                CourierError::Validation(format!("source '{name}': invalid feed_url: {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(CourierError::Validation(format!(
                    "source '{name}': unsupported feed_url scheme: {}",
                    url.scheme()
                )));
            }
            if self.update_interval(source).is_zero() {
                return Err(CourierError::Validation(format!(
                    "source '{name}': update interval must be greater than zero"
                )));
            }
        }

        if self.scheduler.queue_capacity == 0 {
            return Err(CourierError::Validation(
                "scheduler.queue_capacity must be greater than zero".to_string(),
            ));
        }

        if self.telegram.bot_token.is_empty() {
            return Err(CourierError::Validation(format!(
                "Telegram bot token is not set. \
                 Set telegram.bot_token or the {ENV_BOT_TOKEN} environment variable."
            )));
        }
        if self.telegram.chat_id == 0 {
            return Err(CourierError::Validation(
                "telegram.chat_id must be set".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> Config {
        Config::parse(
            r#"
[telegram]
bot_token = "123:abc"
chat_id = -1001

[sources.blog]
feed_url = "https://example.com/feed.xml"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database.url, "sqlite://data/feedcourier.db?mode=rwc");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.op_timeout_secs, 10);

        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());

        assert_eq!(config.scheduler.queue_capacity, 64);
        assert_eq!(config.scheduler.default_update_interval_secs, 300);
        assert_eq!(config.scheduler.bootstrap_lookback_secs, 3600);

        assert_eq!(config.fetcher.connect_timeout_secs, 10);
        assert_eq!(config.fetcher.read_timeout_secs, 20);
        assert_eq!(config.fetcher.total_timeout_secs, 30);
        assert_eq!(config.fetcher.max_redirects, 5);
        assert_eq!(config.fetcher.max_feed_size_bytes, 5 * 1024 * 1024);

        assert_eq!(config.flaresolverr.url, "http://localhost:8191/v1");
        assert_eq!(config.flaresolverr.max_timeout_ms, 60_000);
        assert!(config.flaresolverr.disable_media);

        assert!(config.telegram.bot_token.is_empty());
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.telegram.poll_timeout_secs, 30);

        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[database]
url = "postgres://courier@localhost/courier"
max_connections = 2
op_timeout_secs = 3

[logging]
level = "debug"
file = "logs/courier.log"

[scheduler]
queue_capacity = 8
default_update_interval_secs = 120
bootstrap_lookback_secs = 600

[flaresolverr]
url = "http://solver:8191/v1"
max_timeout_ms = 30000
disable_media = false

[telegram]
chat_id = 42
poll_timeout_secs = 10

[sources.blog]
feed_url = "https://blog.example.com/rss"
update_interval_secs = 900

[sources.news]
feed_url = "https://news.example.com/atom.xml"
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.database.url, "postgres://courier@localhost/courier");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.op_timeout_secs, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file.as_deref(), Some("logs/courier.log"));
        assert_eq!(config.scheduler.queue_capacity, 8);
        assert_eq!(config.scheduler.bootstrap_lookback_secs, 600);
        assert_eq!(config.flaresolverr.url, "http://solver:8191/v1");
        assert!(!config.flaresolverr.disable_media);
        assert_eq!(config.telegram.chat_id, 42);
        assert_eq!(config.telegram.poll_timeout_secs, 10);

        assert_eq!(config.sources.len(), 2);
        let blog = &config.sources["blog"];
        assert_eq!(blog.feed_url, "https://blog.example.com/rss");
        assert_eq!(config.update_interval(blog), Duration::from_secs(900));
        let news = &config.sources["news"];
        assert_eq!(config.update_interval(news), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(CourierError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(CourierError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[sources.blog]\nfeed_url = \"https://example.com/feed.xml\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.sources.contains_key("blog"));
    }

    #[test]
    fn test_apply_env_overrides() {
        let original_token = std::env::var(ENV_BOT_TOKEN).ok();
        let original_db = std::env::var(ENV_DATABASE_URL).ok();

        std::env::set_var(ENV_BOT_TOKEN, "env-token");
        std::env::set_var(ENV_DATABASE_URL, "");

        let mut config = Config::default();
        config.database.url = "sqlite://keep.db".to_string();
        config.apply_env_overrides();

        assert_eq!(config.telegram.bot_token, "env-token");
        // Empty values never override
        assert_eq!(config.database.url, "sqlite://keep.db");

        match original_token {
            Some(val) => std::env::set_var(ENV_BOT_TOKEN, val),
            None => std::env::remove_var(ENV_BOT_TOKEN),
        }
        match original_db {
            Some(val) => std::env::set_var(ENV_DATABASE_URL, val),
            None => std::env::remove_var(ENV_DATABASE_URL),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_sources() {
        let mut config = valid_config();
        config.sources.clear();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one source"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = valid_config();
        config.sources.get_mut("blog").unwrap().update_interval_secs = Some(0);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_validate_rejects_bad_feed_url() {
        let mut config = valid_config();
        config.sources.get_mut("blog").unwrap().feed_url = "ftp://example.com/feed".to_string();
        assert!(config.validate().is_err());

        config.sources.get_mut("blog").unwrap().feed_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_bot_token() {
        let mut config = valid_config();
        config.telegram.bot_token.clear();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(ENV_BOT_TOKEN));
    }

    #[test]
    fn test_validate_requires_chat_id() {
        let mut config = valid_config();
        config.telegram.chat_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_queue_capacity() {
        let mut config = valid_config();
        config.scheduler.queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
