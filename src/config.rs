//! Application configuration: YAML file (optional) plus environment overrides.
//!
//! Resolution order: built-in defaults, then the file named by `TOPGEAR_CONFIG`
//! (or `topgear.yaml` in the working directory when present), then env vars.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "topgear.yaml";
pub const CONFIG_PATH_ENV: &str = "TOPGEAR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address for `topgear serve`.
    pub bind_addr: String,
    /// SimulationCraft executable used by the local job runner.
    pub simc_bin: PathBuf,
    /// Number of simulation jobs that may run at once.
    pub job_workers: usize,
    /// How long finished or failed jobs keep their results.
    pub job_result_ttl_secs: u64,
    /// Status polling interval for the CLI `run` command.
    pub poll_interval_ms: u64,
    /// Upper bound on trinkets accepted for one pairwise sweep.
    pub max_pair_items: usize,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub ttl_secs: u64,
    pub timeout_secs: u64,
    /// Concurrent lookups. 0 uses the rayon default (all cores).
    pub workers: usize,
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            simc_bin: PathBuf::from("/usr/local/bin/simc"),
            job_workers: 1,
            job_result_ttl_secs: 500,
            poll_interval_ms: 1000,
            max_pair_items: 60,
            metadata: MetadataConfig::default(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 6 * 60 * 60,
            timeout_secs: 10,
            workers: 4,
            user_agent: concat!("topgear/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `TOPGEAR_CONFIG` / `topgear.yaml` and apply process env overrides.
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let base = match explicit.as_deref() {
            Some(path) => Self::from_yaml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
                Self::from_yaml_file(DEFAULT_CONFIG_PATH)?
            }
            None => Self::default(),
        };
        Ok(base.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply `TOPGEAR_BIND`, `SIMC_BIN`, `TOPGEAR_JOB_WORKERS` and `TOPGEAR_POLL_MS`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("TOPGEAR_BIND").filter(|v| !v.trim().is_empty()) {
            self.bind_addr = bind;
        }
        if let Some(bin) = lookup("SIMC_BIN").filter(|v| !v.trim().is_empty()) {
            self.simc_bin = PathBuf::from(bin);
        }
        if let Some(workers) = parse_env_number::<usize>(&lookup, "TOPGEAR_JOB_WORKERS") {
            self.job_workers = workers.max(1);
        }
        if let Some(ms) = parse_env_number::<u64>(&lookup, "TOPGEAR_POLL_MS") {
            self.poll_interval_ms = ms;
        }
        self
    }

    pub fn job_result_ttl(&self) -> Duration {
        Duration::from_secs(self.job_result_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl MetadataConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn parse_env_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid numeric env override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = AppConfig::from_yaml_str("").expect("empty config should parse");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = AppConfig::from_yaml_str("bind_addr: 0.0.0.0:9000\nmetadata:\n  workers: 2\n")
            .expect("partial config should parse");
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.metadata.workers, 2);
        assert_eq!(config.metadata.ttl_secs, 6 * 60 * 60);
        assert_eq!(config.max_pair_items, 60);
        assert_eq!(config.job_result_ttl(), Duration::from_secs(500));
    }

    #[test]
    fn env_overrides_apply_and_skip_invalid_numbers() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TOPGEAR_BIND", "127.0.0.1:7777"),
            ("SIMC_BIN", "/opt/simc/simc"),
            ("TOPGEAR_JOB_WORKERS", "not-a-number"),
            ("TOPGEAR_POLL_MS", "250"),
        ]);
        let config = AppConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.bind_addr, "127.0.0.1:7777");
        assert_eq!(config.simc_bin, PathBuf::from("/opt/simc/simc"));
        assert_eq!(config.job_workers, 1);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }
}
