use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::monitor::probe::MAX_PROBE_TIMEOUT_SECONDS;
use crate::scheduler::backoff::BackoffPolicy;
use crate::version::{SERVICE_NAME, VERSION};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for one scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Unique identity of this instance; written as the lease holder.
    pub scheduler_id: String,
    pub database_url: String,
    /// Seconds to sleep between cycles.
    pub loop_interval: u64,
    /// Max targets claimed per cycle.
    pub batch_size: u64,
    /// Lease duration in seconds.
    pub lock_timeout: u64,
    /// Upper bound of the failure backoff delay, in seconds.
    pub max_backoff: u64,
    pub backoff_multiplier: u64,
    /// Targets processed in parallel inside one cycle.
    pub max_concurrency: usize,
    pub log_dir: String,
    pub probe_user_agent: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialSchedulerConfig {
    scheduler_id: Option<String>,
    database_url: Option<String>,
    loop_interval: Option<u64>,
    batch_size: Option<u64>,
    lock_timeout: Option<u64>,
    max_backoff: Option<u64>,
    backoff_multiplier: Option<u64>,
    max_concurrency: Option<usize>,
    log_dir: Option<String>,
    probe_user_agent: Option<String>,
}

/// Settings for the HTTP API process.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub log_dir: String,
    pub probe_user_agent: String,
}

#[derive(Deserialize, Default, Debug)]
struct PartialApiConfig {
    database_url: Option<String>,
    bind_addr: Option<String>,
    log_dir: Option<String>,
    probe_user_agent: Option<String>,
}

fn default_scheduler_id() -> String {
    format!("scheduler-{}", uuid::Uuid::new_v4())
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_user_agent() -> String {
    format!("{SERVICE_NAME}/{VERSION}")
}

fn read_partial_file<T: DeserializeOwned + Default>(
    config_path: Option<&str>,
) -> Result<T, ConfigError> {
    let Some(path_str) = config_path else {
        return Ok(T::default());
    };
    let path = Path::new(path_str);
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_str.to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path_str.to_string(),
        source,
    })
}

/// Longest accepted LOOP_INTERVAL and LOCK_TIMEOUT: one day.
pub const MAX_PERIOD_SECONDS: u64 = 86_400;
/// Longest accepted MAX_BACKOFF: one week.
pub const MAX_BACKOFF_CEILING_SECONDS: u64 = 604_800;

fn ensure_at_least(field: &'static str, value: u64, min: u64) -> Result<u64, ConfigError> {
    if value < min {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be at least {min}, got {value}"),
        });
    }
    Ok(value)
}

fn ensure_between(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let value = ensure_at_least(field, value, min)?;
    if value > max {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be at most {max}, got {value}"),
        });
    }
    Ok(value)
}

fn non_empty(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(_) => Err(ConfigError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        }),
        None => Err(ConfigError::Missing(field)),
    }
}

impl SchedulerConfig {
    /// Loads `.env`, the optional TOML file, then the process environment.
    /// Environment overrides file.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_sources(config_path, std::env::vars())
    }

    pub fn from_sources<I>(config_path: Option<&str>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file_config: PartialSchedulerConfig = read_partial_file(config_path)?;
        let env_config: PartialSchedulerConfig = envy::from_iter(env)?;

        let scheduler_id = match env_config.scheduler_id.or(file_config.scheduler_id) {
            Some(id) => non_empty("SCHEDULER_ID", Some(id))?,
            None => default_scheduler_id(),
        };
        let database_url = non_empty(
            "DATABASE_URL",
            env_config.database_url.or(file_config.database_url),
        )?;

        let loop_interval = ensure_between(
            "LOOP_INTERVAL",
            env_config.loop_interval.or(file_config.loop_interval).unwrap_or(10),
            1,
            MAX_PERIOD_SECONDS,
        )?;
        let batch_size = ensure_at_least(
            "BATCH_SIZE",
            env_config.batch_size.or(file_config.batch_size).unwrap_or(10),
            1,
        )?;
        let lock_timeout = ensure_between(
            "LOCK_TIMEOUT",
            env_config.lock_timeout.or(file_config.lock_timeout).unwrap_or(60),
            u64::from(MAX_PROBE_TIMEOUT_SECONDS) + 1,
            MAX_PERIOD_SECONDS,
        )?;
        let max_backoff = ensure_between(
            "MAX_BACKOFF",
            env_config.max_backoff.or(file_config.max_backoff).unwrap_or(3600),
            1,
            MAX_BACKOFF_CEILING_SECONDS,
        )?;
        let backoff_multiplier = ensure_at_least(
            "BACKOFF_MULTIPLIER",
            env_config
                .backoff_multiplier
                .or(file_config.backoff_multiplier)
                .unwrap_or(2),
            2,
        )?;
        let max_concurrency = env_config
            .max_concurrency
            .or(file_config.max_concurrency)
            .unwrap_or(4);
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "MAX_CONCURRENCY",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(SchedulerConfig {
            scheduler_id,
            database_url,
            loop_interval,
            batch_size,
            lock_timeout,
            max_backoff,
            backoff_multiplier,
            max_concurrency,
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            probe_user_agent: env_config
                .probe_user_agent
                .or(file_config.probe_user_agent)
                .unwrap_or_else(default_user_agent),
        })
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval)
    }

    /// Lease duration. Values past the accepted range clamp to one day.
    pub fn lock_timeout(&self) -> chrono::Duration {
        i64::try_from(self.lock_timeout.min(MAX_PERIOD_SECONDS))
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::days(1))
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            multiplier: self.backoff_multiplier,
            max_backoff_seconds: self.max_backoff,
        }
    }
}

impl ApiConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_sources(config_path, std::env::vars())
    }

    pub fn from_sources<I>(config_path: Option<&str>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file_config: PartialApiConfig = read_partial_file(config_path)?;
        let env_config: PartialApiConfig = envy::from_iter(env)?;

        Ok(ApiConfig {
            database_url: non_empty(
                "DATABASE_URL",
                env_config.database_url.or(file_config.database_url),
            )?,
            bind_addr: env_config
                .bind_addr
                .or(file_config.bind_addr)
                .unwrap_or_else(default_bind_addr),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            probe_user_agent: env_config
                .probe_user_agent
                .or(file_config.probe_user_agent)
                .unwrap_or_else(default_user_agent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        let config = SchedulerConfig::from_sources(
            None,
            env(&[("DATABASE_URL", "postgres://localhost/monitor")]),
        )
        .unwrap();

        assert!(config.scheduler_id.starts_with("scheduler-"));
        assert_eq!(config.loop_interval, 10);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.lock_timeout, 60);
        assert_eq!(config.max_backoff, 3600);
        assert_eq!(config.backoff_multiplier, 2);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.lock_timeout(), chrono::Duration::seconds(60));
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        let err = SchedulerConfig::from_sources(None, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "scheduler_id = \"from-file\"\ndatabase_url = \"postgres://file/db\"\nbatch_size = 25\nloop_interval = 30"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = SchedulerConfig::from_sources(
            Some(&path),
            env(&[("SCHEDULER_ID", "from-env"), ("LOOP_INTERVAL", "5")]),
        )
        .unwrap();

        assert_eq!(config.scheduler_id, "from-env");
        assert_eq!(config.database_url, "postgres://file/db");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.loop_interval, 5);
    }

    #[test]
    fn test_backoff_multiplier_below_two_is_rejected() {
        let err = SchedulerConfig::from_sources(
            None,
            env(&[("DATABASE_URL", "postgres://x/y"), ("BACKOFF_MULTIPLIER", "1")]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "BACKOFF_MULTIPLIER",
                ..
            }
        ));
    }

    #[test]
    fn test_lock_timeout_must_outlive_probe() {
        let err = SchedulerConfig::from_sources(
            None,
            env(&[("DATABASE_URL", "postgres://x/y"), ("LOCK_TIMEOUT", "30")]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "LOCK_TIMEOUT",
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_periods_are_rejected() {
        for field in ["LOCK_TIMEOUT", "LOOP_INTERVAL", "MAX_BACKOFF"] {
            let err = SchedulerConfig::from_sources(
                None,
                env(&[
                    ("DATABASE_URL", "postgres://x/y"),
                    (field, "9223372036854775807"),
                ]),
            )
            .unwrap_err();
            match err {
                ConfigError::Invalid { field: got, reason } => {
                    assert_eq!(got, field);
                    assert!(reason.contains("at most"), "{reason}");
                }
                other => panic!("{field}: unexpected error {other:?}"),
            }
        }

        let config = SchedulerConfig::from_sources(
            None,
            env(&[
                ("DATABASE_URL", "postgres://x/y"),
                ("LOCK_TIMEOUT", "86400"),
                ("MAX_BACKOFF", "604800"),
            ]),
        )
        .unwrap();
        assert_eq!(config.lock_timeout(), chrono::Duration::days(1));
    }

    #[test]
    fn test_lock_timeout_accessor_never_panics() {
        let mut config =
            SchedulerConfig::from_sources(None, env(&[("DATABASE_URL", "postgres://x/y")]))
                .unwrap();
        config.lock_timeout = u64::MAX;
        assert_eq!(config.lock_timeout(), chrono::Duration::days(1));
    }

    #[test]
    fn test_blank_scheduler_id_is_rejected() {
        let err = SchedulerConfig::from_sources(
            None,
            env(&[("DATABASE_URL", "postgres://x/y"), ("SCHEDULER_ID", "  ")]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "SCHEDULER_ID",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_number_is_an_env_error() {
        let err = SchedulerConfig::from_sources(
            None,
            env(&[("DATABASE_URL", "postgres://x/y"), ("BATCH_SIZE", "many")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn test_api_config_defaults() {
        let config =
            ApiConfig::from_sources(None, env(&[("DATABASE_URL", "postgres://x/y")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.log_dir, "logs");
        assert!(config.probe_user_agent.starts_with("linkwatch/"));
    }
}
