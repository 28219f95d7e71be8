//! Process configuration read from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use tokio::time::Duration;

use crate::utils::RetryPolicy;

pub const SCHEMA_PATH_VAR: &str = "SCHEMA_PATH";
pub const RETRY_MAX_RETRIES_VAR: &str = "RETRY_MAX_RETRIES";
pub const RETRY_BASE_DELAY_MS_VAR: &str = "RETRY_BASE_DELAY_MS";
pub const RETRY_BACKOFF_EXPONENT_VAR: &str = "RETRY_BACKOFF_EXPONENT";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// JSON file holding an array of table schemas.
    pub schema_path: PathBuf,
    pub retry_policy: RetryPolicy,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup.
    ///
    /// Unset retry variables keep the [`RetryPolicy`] defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let schema_path = lookup(SCHEMA_PATH_VAR)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("{SCHEMA_PATH_VAR} must point at the table schema file"))?;

        let mut retry_policy = RetryPolicy::default();
        if let Some(max_retries) = parse_var(&lookup, RETRY_MAX_RETRIES_VAR)? {
            retry_policy.max_retries = max_retries;
        }
        if let Some(millis) = parse_var(&lookup, RETRY_BASE_DELAY_MS_VAR)? {
            retry_policy.base_delay = Duration::from_millis(millis);
        }
        if let Some(exponent) = parse_var(&lookup, RETRY_BACKOFF_EXPONENT_VAR)? {
            retry_policy.backoff_exponent = exponent;
        }

        Ok(Self {
            schema_path,
            retry_policy,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid {name} '{raw}'"))
        })
        .transpose()
}
