use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the observation store persists finalized envelope files
    /// into.
    pub root_directory: PathBuf,

    /// Path to a JSON `CobaltConfigFile` describing the customer/project/
    /// metric/report registry this process serves.
    pub registry_path: PathBuf,

    /// HTTP endpoint envelopes are uploaded to.
    pub upload_endpoint: String,

    /// 32-byte hex-encoded recipient public key. When unset, envelopes are
    /// shipped unencrypted (`NoOpEncrypter`), which is only appropriate
    /// behind a trusted transport.
    pub recipient_key_hex: Option<String>,

    pub max_bytes_per_observation: u64,
    pub max_bytes_per_envelope: u64,
    pub max_bytes_total: u64,

    pub min_interval: Duration,
    pub target_interval: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,

    pub per_attempt_deadline: Duration,
}

impl Config {
    /// Loads configuration from the environment, applying the same
    /// defaults an on-device agent would ship with.
    ///
    /// # Errors
    /// Returns an error if a required variable is unset or a numeric
    /// variable fails to parse.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            root_directory: env::var("COBALT_ROOT_DIR").unwrap_or_else(|_| "./cobalt-data".into()).into(),
            registry_path: env::var("COBALT_REGISTRY_PATH").context("COBALT_REGISTRY_PATH must be set")?.into(),
            upload_endpoint: env::var("COBALT_UPLOAD_ENDPOINT").context("COBALT_UPLOAD_ENDPOINT must be set")?,
            recipient_key_hex: env::var("COBALT_RECIPIENT_KEY").ok(),
            max_bytes_per_observation: parse_env_or("COBALT_MAX_BYTES_PER_OBSERVATION", 100 * 1024)?,
            max_bytes_per_envelope: parse_env_or("COBALT_MAX_BYTES_PER_ENVELOPE", 1024 * 1024)?,
            max_bytes_total: parse_env_or("COBALT_MAX_BYTES_TOTAL", 64 * 1024 * 1024)?,
            min_interval: Duration::from_secs(parse_env_or("COBALT_MIN_INTERVAL_SECS", 60)?),
            target_interval: Duration::from_secs(parse_env_or("COBALT_TARGET_INTERVAL_SECS", 3600)?),
            initial_interval: Duration::from_secs(parse_env_or("COBALT_INITIAL_INTERVAL_SECS", 60)?),
            max_interval: Duration::from_secs(parse_env_or("COBALT_MAX_INTERVAL_SECS", 3600)?),
            per_attempt_deadline: Duration::from_secs(parse_env_or("COBALT_UPLOAD_DEADLINE_SECS", 30)?),
        })
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| anyhow::anyhow!("{key} is set but invalid: {e}")),
        Err(_) => Ok(default),
    }
}
