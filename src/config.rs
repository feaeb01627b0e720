//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::envelope::LinkSettings;
use crate::jobs::ReclaimConfig;
use crate::transfer::TradeParticipant;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    pub host: String,
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Pool-holding account every envelope transfer names as counterparty
    pub system_account: TradeParticipant,

    /// Base of shareable envelope links
    pub envelope_links: LinkSettings,

    /// Identifies this process in lock holder tokens
    pub instance_id: String,

    pub reclaim: ReclaimConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("PORT", 3000)?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let system_account = TradeParticipant::new(
            env::var("SYSTEM_ACCOUNT_NO").unwrap_or_else(|_| "10000020190101010000000000000001".to_string()),
            env::var("SYSTEM_USER_ID").unwrap_or_else(|_| "100001".to_string()),
            env::var("SYSTEM_USERNAME").unwrap_or_else(|_| "system".to_string()),
        );

        let defaults = LinkSettings::default();
        let envelope_links = LinkSettings {
            domain: env::var("ENVELOPE_DOMAIN").unwrap_or(defaults.domain),
            path: env::var("ENVELOPE_LINK").unwrap_or(defaults.path),
        };

        let instance_id = env::var("INSTANCE_ID")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().simple().to_string()[..12].to_string());

        let reclaim = reclaim_from_env()?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            system_account,
            envelope_links,
            instance_id,
            reclaim,
        })
    }
}

/// Reclaim job settings, each `RECLAIM_*` variable overriding its default
fn reclaim_from_env() -> Result<ReclaimConfig, ConfigError> {
    let defaults = ReclaimConfig::default();
    let reclaim = ReclaimConfig {
        interval: Duration::from_secs(parse_or(
            "RECLAIM_INTERVAL_SECS",
            defaults.interval.as_secs(),
        )?),
        lock_lease: Duration::from_secs(parse_or(
            "RECLAIM_LOCK_LEASE_SECS",
            defaults.lock_lease.as_secs(),
        )?),
        lock_tries: parse_or("RECLAIM_LOCK_TRIES", defaults.lock_tries)?,
        lock_retry_delay: Duration::from_millis(parse_or(
            "RECLAIM_LOCK_RETRY_MS",
            defaults.lock_retry_delay.as_millis() as u64,
        )?),
        page_size: parse_or("RECLAIM_PAGE_SIZE", defaults.page_size)?,
        max_pages: parse_or("RECLAIM_MAX_PAGES", defaults.max_pages)?,
        ..defaults
    };

    if reclaim.interval.is_zero() {
        return Err(ConfigError::InvalidValue("RECLAIM_INTERVAL_SECS"));
    }
    if reclaim.lock_tries < 1 {
        return Err(ConfigError::InvalidValue("RECLAIM_LOCK_TRIES"));
    }
    if reclaim.page_size < 1 {
        return Err(ConfigError::InvalidValue("RECLAIM_PAGE_SIZE"));
    }
    if reclaim.max_pages < 1 {
        return Err(ConfigError::InvalidValue("RECLAIM_MAX_PAGES"));
    }
    Ok(reclaim)
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
