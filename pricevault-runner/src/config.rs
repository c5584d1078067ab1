//! Serializable sync configuration.
//!
//! Loaded from a TOML file and then overridden by CLI flags. Every field has
//! a default, so an empty file (or no file) is a valid configuration.

use chrono::NaiveDate;
use pricevault_core::data::YahooSettings;
use pricevault_core::UniverseRules;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on `lookback_years`.
pub const MAX_LOOKBACK_YEARS: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for one incremental sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// SQLite database file.
    pub db_path: PathBuf,

    /// How far back a never-ingested symbol is fetched, in 365-day years.
    pub lookback_years: u32,

    /// Fetch worker count. Defaults to 4x available parallelism.
    pub workers: Option<usize>,

    /// Hand-off channel capacity in batches. Defaults to 4x workers.
    pub channel_capacity: Option<usize>,

    /// Report progress every N completed symbols.
    pub progress_every: usize,

    /// Override "today" (UTC). Used for reproducible runs.
    pub today: Option<NaiveDate>,

    pub provider: YahooProviderConfig,

    pub universe: UniverseRules,
}

/// Provider section: connection settings plus the breaker cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooProviderConfig {
    #[serde(flatten)]
    pub settings: YahooSettings,
    pub breaker_cooldown_secs: u64,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        Self {
            settings: YahooSettings::default(),
            breaker_cooldown_secs: 30 * 60,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/prices.db"),
            lookback_years: 10,
            workers: None,
            channel_capacity: None,
            progress_every: 200,
            today: None,
            provider: YahooProviderConfig::default(),
            universe: UniverseRules::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.channel_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if self.lookback_years > MAX_LOOKBACK_YEARS {
            return Err(ConfigError::Invalid(format!(
                "lookback_years must be at most {MAX_LOOKBACK_YEARS}, got {}",
                self.lookback_years
            )));
        }
        if self.progress_every == 0 {
            return Err(ConfigError::Invalid(
                "progress_every must be at least 1".into(),
            ));
        }
        if self.provider.settings.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Effective "today": the override, else the current UTC date.
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| chrono::Utc::now().date_naive())
    }

    /// Worker count for `jobs` symbols: configured or 4x parallelism,
    /// clamped to `[1, jobs]`.
    pub fn worker_count(&self, jobs: usize) -> usize {
        let wanted = self.workers.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
            (cores * 4).max(1)
        });
        wanted.min(jobs).max(1)
    }

    /// Channel capacity for a given worker count.
    pub fn channel_capacity(&self, workers: usize) -> usize {
        self.channel_capacity.unwrap_or(workers * 4).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = SyncConfig::from_toml("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.lookback_years, 10);
        assert_eq!(config.provider.settings.timeout_secs, 10);
    }

    #[test]
    fn parses_sections() {
        let config = SyncConfig::from_toml(
            r#"
db_path = "/tmp/x.db"
lookback_years = 3
workers = 8
today = "2024-06-01"

[provider]
base_url = "http://localhost:8080"
timeout_secs = 5
breaker_cooldown_secs = 60

[universe]
quote_suffix = "EUR"
limit = 50
"#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.workers, Some(8));
        assert_eq!(config.today(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(config.provider.settings.base_url, "http://localhost:8080");
        assert_eq!(config.provider.settings.user_agent, "Mozilla/5.0");
        assert_eq!(config.provider.breaker_cooldown_secs, 60);
        assert_eq!(config.universe.quote_suffix, "EUR");
        assert_eq!(config.universe.limit, Some(50));
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(matches!(
            SyncConfig::from_toml("workers = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_excessive_lookback() {
        assert!(matches!(
            SyncConfig::from_toml("lookback_years = 1000000"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(SyncConfig::from_toml("lookback_years = 1000").is_ok());
    }

    #[test]
    fn worker_count_clamps_to_jobs() {
        let config = SyncConfig {
            workers: Some(50),
            ..SyncConfig::default()
        };
        assert_eq!(config.worker_count(3), 3);
        assert_eq!(config.worker_count(0), 1);
        assert_eq!(config.worker_count(100), 50);
    }

    #[test]
    fn default_capacity_is_four_per_worker() {
        let config = SyncConfig::default();
        assert_eq!(config.channel_capacity(5), 20);
        let fixed = SyncConfig {
            channel_capacity: Some(2),
            ..SyncConfig::default()
        };
        assert_eq!(fixed.channel_capacity(5), 2);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn worker_count_stays_within_job_count(
                workers in proptest::option::of(1usize..256),
                jobs in 0usize..10_000,
            ) {
                let config = SyncConfig {
                    workers,
                    ..SyncConfig::default()
                };
                let n = config.worker_count(jobs);
                prop_assert!(n >= 1);
                prop_assert!(n <= jobs.max(1));
                prop_assert!(config.channel_capacity(n) >= 1);
            }
        }
    }
}
