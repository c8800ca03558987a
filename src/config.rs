//! Runtime configuration, loaded from the environment (see SPEC_FULL.md §B).
//!
//! Mirrors the teacher's `main.rs` habit of calling `dotenvy::dotenv()` before
//! touching anything else, but centralizes the resulting settings into one
//! validated struct instead of reading `std::env::var` ad hoc throughout the
//! binary.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

const ENV_PREFIX: &str = "SPL_";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub run_state_dir: PathBuf,
    pub worker_count: usize,
    pub queue_depth: usize,
    pub chunk_size: usize,
    pub chunk_bytes: u64,
    pub stale_run_threshold: Duration,
    pub intermediate_format: IntermediateFormat,
    /// How many archives the orchestrator groups into a single
    /// staging/merge cycle (spec.md §4.5 "Batching policy"; config key
    /// `delta.batch_archives`). Default 1: every archive gets its own cycle.
    pub batch_archives: usize,
    /// Base directory malformed files are copied under, keyed by archive
    /// name (spec.md §6 `quarantine_path`). Defaults to
    /// `<run_state_dir>/runs/<run_id>/quarantine`.
    pub quarantine_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntermediateFormat {
    Csv,
    Parquet,
}

impl Config {
    /// Loads configuration from environment variables (after `dotenvy` has
    /// populated `std::env` from any `.env` file) and, if present, an
    /// `spl.toml` file in the current directory whose keys override the
    /// environment. Environment variables use the `SPL_` prefix named in
    /// spec.md §6.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file_overrides = load_toml_overrides()?;

        let database_url = env_or_toml("DATABASE_URL", "database_url", &file_overrides)
            .ok_or_else(|| ConfigError::Missing(format!("{ENV_PREFIX}DATABASE_URL")))?;

        let run_state_dir = env_or_toml("RUN_STATE_DIR", "run_state_dir", &file_overrides)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./runs"));

        let worker_count = parse_usize("WORKER_COUNT", "worker_count", &file_overrides, num_cpus())?;
        let queue_depth = parse_usize("QUEUE_DEPTH", "queue_depth", &file_overrides, worker_count * 2)?;
        let chunk_size = parse_usize("CHUNK_SIZE", "chunk_size", &file_overrides, 50_000)?;

        let chunk_bytes = env_or_toml("CHUNK_BYTES", "chunk_bytes", &file_overrides)
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::Invalid {
                key: format!("{ENV_PREFIX}CHUNK_BYTES"),
                detail: e.to_string(),
            })?
            .unwrap_or(64 * 1024 * 1024);

        let stale_run_hours = env_or_toml("STALE_RUN_HOURS", "stale_run_hours", &file_overrides)
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::Invalid {
                key: format!("{ENV_PREFIX}STALE_RUN_HOURS"),
                detail: e.to_string(),
            })?
            .unwrap_or(6);

        let intermediate_format = match env_or_toml("INTERMEDIATE_FORMAT", "intermediate_format", &file_overrides)
            .as_deref()
        {
            None | Some("csv") => IntermediateFormat::Csv,
            Some("parquet") => IntermediateFormat::Parquet,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: format!("{ENV_PREFIX}INTERMEDIATE_FORMAT"),
                    detail: format!("unknown format '{other}', expected csv or parquet"),
                })
            }
        };

        if worker_count == 0 {
            return Err(ConfigError::Invalid {
                key: format!("{ENV_PREFIX}WORKER_COUNT"),
                detail: "must be at least 1".to_string(),
            });
        }

        let batch_archives = parse_usize("DELTA_BATCH_ARCHIVES", "delta.batch_archives", &file_overrides, 1)?;
        if batch_archives == 0 {
            return Err(ConfigError::Invalid {
                key: format!("{ENV_PREFIX}DELTA_BATCH_ARCHIVES"),
                detail: "must be at least 1".to_string(),
            });
        }

        let quarantine_path =
            env_or_toml("QUARANTINE_PATH", "quarantine_path", &file_overrides).map(PathBuf::from);

        Ok(Config {
            database_url,
            run_state_dir,
            worker_count,
            queue_depth,
            chunk_size,
            chunk_bytes,
            stale_run_threshold: Duration::from_secs(stale_run_hours * 3600),
            intermediate_format,
            batch_archives,
            quarantine_path,
        })
    }
}

fn load_toml_overrides() -> Result<toml::Value, ConfigError> {
    match std::fs::read_to_string("spl.toml") {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(_) => Ok(toml::Value::Table(Default::default())),
    }
}

fn env_or_toml(env_key: &str, toml_key: &str, overrides: &toml::Value) -> Option<String> {
    if let Ok(v) = std::env::var(format!("{ENV_PREFIX}{env_key}")) {
        return Some(v);
    }
    overrides.get(toml_key).and_then(|v| v.as_str()).map(str::to_string)
}

fn parse_usize(
    env_key: &str,
    toml_key: &str,
    overrides: &toml::Value,
    default: usize,
) -> Result<usize, ConfigError> {
    match env_or_toml(env_key, toml_key, overrides) {
        None => Ok(default),
        Some(v) => v.parse::<usize>().map_err(|e| ConfigError::Invalid {
            key: format!("{ENV_PREFIX}{env_key}"),
            detail: e.to_string(),
        }),
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_depth_defaults_to_twice_worker_count() {
        let overrides = toml::Value::Table(Default::default());
        let workers = parse_usize("WORKER_COUNT", "worker_count", &overrides, 6).unwrap();
        let depth = parse_usize("QUEUE_DEPTH", "queue_depth", &overrides, workers * 2).unwrap();
        assert_eq!(depth, 12);
    }

    #[test]
    fn rejects_unknown_intermediate_format() {
        std::env::set_var("SPL_INTERMEDIATE_FORMAT", "xlsx");
        let result = Config::from_env();
        std::env::remove_var("SPL_INTERMEDIATE_FORMAT");
        std::env::remove_var("SPL_DATABASE_URL");
        assert!(result.is_err());
    }
}
