use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_PROV_SERVER_URL: &str =
    "https://sbx.api.trustedservices.intel.com/sgx/certification/v3";
pub const DEFAULT_REFRESH_HOURS: u64 = 24;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_WAIT_TIME_SECS: u64 = 1;
pub const DEFAULT_HTTP_PORT: u16 = 9000;

/// How cache misses are served. Only the inline model is defined; other
/// selector values are reserved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CachingModel {
    LazyCacheInline,
}

impl TryFrom<u8> for CachingModel {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(CachingModel::LazyCacheInline),
            other => bail!("caching model {other} is reserved"),
        }
    }
}

/// Process configuration, read from the environment once at startup and
/// handed to the upstream client and the scheduler by the constructors.
#[derive(Clone, Debug)]
pub struct Configuration {
    pub prov_server_url: String,
    pub api_subscription_key: String,
    pub refresh_hours: u64,
    pub retry_count: u32,
    pub wait_time: Duration,
    pub caching_model: CachingModel,
    pub port: u16,
    pub database_url: String,
}

impl Configuration {
    pub fn from_env() -> Result<Self> {
        let prov_server_url = env_or("SCS_PROV_SERVER_URL", DEFAULT_PROV_SERVER_URL);
        let api_subscription_key = env_or("SCS_API_SUBSCRIPTION_KEY", "");
        let refresh_hours = parse_env("SCS_REFRESH_HOURS", DEFAULT_REFRESH_HOURS)?;
        let retry_count = parse_env("SCS_RETRY_COUNT", DEFAULT_RETRY_COUNT)?;
        let wait_time_secs = parse_env("SCS_WAIT_TIME_SECS", DEFAULT_WAIT_TIME_SECS)?;
        let caching_model: u8 = parse_env("SCS_CACHING_MODEL", 1u8)?;
        let port = parse_env("SCS_PORT", DEFAULT_HTTP_PORT)?;

        if refresh_hours == 0 {
            bail!("SCS_REFRESH_HOURS must be at least 1");
        }

        Ok(Self {
            prov_server_url: prov_server_url.trim_end_matches('/').to_string(),
            api_subscription_key,
            refresh_hours,
            retry_count,
            wait_time: Duration::from_secs(wait_time_secs),
            caching_model: CachingModel::try_from(caching_model)?,
            port,
            database_url: database_url_from_env()?,
        })
    }
}

fn database_url_from_env() -> Result<String> {
    let hostname = require_env("SCS_DB_HOSTNAME")?;
    let port = require_env("SCS_DB_PORT")?;
    let username = require_env("SCS_DB_USERNAME")?;
    let password = require_env("SCS_DB_PASSWORD")?;
    let name = require_env("SCS_DB_NAME")?;
    Ok(format!(
        "postgres://{username}:{password}@{hostname}:{port}/{name}"
    ))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value")),
        Err(_) => Ok(default),
    }
}
