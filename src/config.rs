use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::{
    cache::CacheConfig,
    error::{ConfigError, SchedulerError},
    retry::RetryConfig,
    scheduler::CronSchedule,
    service::DEFAULT_FETCH_CRON_PATTERN,
    source::Source,
};

pub const ENV_FLIGHT_SOURCES: &str = "FLIGHT_SOURCES";
pub const ENV_HOT_CACHE_TTL_SEC: &str = "HOT_CACHE_TTL_SEC";
pub const ENV_FETCH_CRON_PATTERN: &str = "FLIGHTS_FETCH_CRON_PATTERN";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    // Upstream endpoints, in the order their flights are merged
    #[serde(default)]
    pub sources: Vec<String>,

    // Lifetime of the hot slot; non-positive means 60 seconds
    #[serde(default = "default_hot_cache_ttl_sec")]
    pub hot_cache_ttl_sec: i64,

    #[serde(default = "default_fetch_cron_pattern")]
    pub fetch_cron_pattern: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_hot_cache_ttl_sec() -> i64 {
    60
}

fn default_fetch_cron_pattern() -> String {
    DEFAULT_FETCH_CRON_PATTERN.to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            hot_cache_ttl_sec: default_hot_cache_ttl_sec(),
            fetch_cron_pattern: default_fetch_cron_pattern(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Reads the optional TOML file, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    // `lookup` maps an environment variable name to its value
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(sources) = lookup(ENV_FLIGHT_SOURCES) {
            self.sources = sources
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(ttl) = lookup(ENV_HOT_CACHE_TTL_SEC) {
            match ttl.trim().parse::<i64>() {
                Ok(ttl) => self.hot_cache_ttl_sec = ttl,
                Err(e) => warn!(
                    "Ignoring {}={:?}: {}, keeping {}",
                    ENV_HOT_CACHE_TTL_SEC, ttl, e, self.hot_cache_ttl_sec
                ),
            }
        }

        if let Some(pattern) = lookup(ENV_FETCH_CRON_PATTERN) {
            if !pattern.trim().is_empty() {
                self.fetch_cron_pattern = pattern.trim().to_string();
            }
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    /// Malformed source endpoints are only warned about here: each one fails
    /// its own fetch with a configuration error at refresh time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        for source in &self.sources {
            if let Err(e) = Source::parse(source) {
                warn!("{}", e);
            }
        }

        CronSchedule::parse(&self.fetch_cron_pattern).map_err(|e| match e {
            SchedulerError::InvalidPattern { message, .. } => ConfigError::InvalidValue {
                key: "fetch_cron_pattern".to_string(),
                message,
            },
            other => ConfigError::InvalidValue {
                key: "fetch_cron_pattern".to_string(),
                message: other.to_string(),
            },
        })?;

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if self.cache.max_entries < self.sources.len() + 2 {
            return Err(ConfigError::InvalidValue {
                key: "cache.max_entries".to_string(),
                message: format!(
                    "must hold both flight slots and {} sources",
                    self.sources.len()
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert!(config.sources.is_empty());
        assert_eq!(config.hot_cache_ttl_sec, 60);
        assert_eq!(config.fetch_cron_pattern, "0 */5 * * * *");
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retry_delay_ms, 0);
        assert_eq!(config.cache.max_entries, 1024);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_full_file() {
        let config = AppConfig::from_toml_str(
            r#"
            sources = ["https://source1.example.com/flights", "https://source2.example.com/flights"]
            hot_cache_ttl_sec = 10
            fetch_cron_pattern = "0 */1 * * * *"
            request_timeout_ms = 2500
            log_level = "debug"

            [retry]
            max_retries = 5
            retry_delay_ms = 200

            [cache]
            max_entries = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.hot_cache_ttl_sec, 10);
        assert_eq!(config.fetch_cron_pattern, "0 */1 * * * *");
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.retry_delay_ms, 200);
        assert_eq!(config.cache.max_entries, 64);
        assert_eq!(config.log_level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reject_malformed_file() {
        assert!(matches!(
            AppConfig::from_toml_str("hot_cache_ttl_sec = \"soon\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(env(&[
            (ENV_FLIGHT_SOURCES, " https://a.example.com/f , ,https://b.example.com/f"),
            (ENV_HOT_CACHE_TTL_SEC, "15"),
            (ENV_FETCH_CRON_PATTERN, "0 */2 * * * *"),
            (ENV_LOG_LEVEL, "warn"),
        ]));

        assert_eq!(
            config.sources,
            vec!["https://a.example.com/f", "https://b.example.com/f"]
        );
        assert_eq!(config.hot_cache_ttl_sec, 15);
        assert_eq!(config.fetch_cron_pattern, "0 */2 * * * *");
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_unparseable_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(env(&[
            (ENV_HOT_CACHE_TTL_SEC, "sixty"),
            (ENV_FETCH_CRON_PATTERN, "  "),
        ]));

        assert_eq!(config.hot_cache_ttl_sec, 60);
        assert_eq!(config.fetch_cron_pattern, DEFAULT_FETCH_CRON_PATTERN);
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoSources)));

        config.sources = vec!["https://a.example.com/f".to_string()];
        assert!(config.validate().is_ok());

        // malformed endpoints surface per fetch, not here
        config.sources.push(String::new());
        assert!(config.validate().is_ok());

        config.fetch_cron_pattern = "every now and then".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "fetch_cron_pattern"
        ));

        config.fetch_cron_pattern = DEFAULT_FETCH_CRON_PATTERN.to_string();
        config.cache.max_entries = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "flight_aggregator_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "sources = [\"https://source1.example.com/flights\"]\nhot_cache_ttl_sec = 0\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.sources, vec!["https://source1.example.com/flights"]);
        assert_eq!(config.hot_cache_ttl_sec, 0);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::from_file("/nonexistent/flight_aggregator.toml"),
            Err(ConfigError::IoError(_))
        ));
    }
}
