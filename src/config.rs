//! Portal configuration parsed from environment variables.

use std::path::PathBuf;

use crate::api::transport::TransportTimeouts;
use crate::tenant::DEFAULT_TENANT_CACHE_TTL_SECS;

pub const DEFAULT_PLATFORM_DOMAINS: &str = "localhost";
pub const DEFAULT_API_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub api_base_url: String,
    pub platform_domains: Vec<String>,
    pub tenant_cache_ttl_secs: u64,
    pub timeouts: TransportTimeouts,
    pub token_store_path: Option<PathBuf>,
    pub port: u16,
}

impl PortalConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `API_BASE_URL`
    ///
    /// Optional:
    /// - `PLATFORM_DOMAINS`: comma separated, default `localhost`
    /// - `TENANT_CACHE_TTL_SECS`: default 300
    /// - `API_REQUEST_TIMEOUT_SECS`: default 30
    /// - `API_CONNECT_TIMEOUT_SECS`: default 10
    /// - `TOKEN_STORE_PATH`: persist tokens to this JSON file
    /// - `PORT`: default 3000
    ///
    /// # Errors
    ///
    /// Returns an error if `API_BASE_URL` is missing or a numeric value does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("API_BASE_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("API_BASE_URL"))?;

        let platform_domains = parse_domains(
            &std::env::var("PLATFORM_DOMAINS").unwrap_or_else(|_| DEFAULT_PLATFORM_DOMAINS.to_owned()),
        );

        Ok(Self {
            api_base_url,
            platform_domains,
            tenant_cache_ttl_secs: env_parse("TENANT_CACHE_TTL_SECS", DEFAULT_TENANT_CACHE_TTL_SECS)?,
            timeouts: TransportTimeouts {
                request_secs: env_parse("API_REQUEST_TIMEOUT_SECS", DEFAULT_API_REQUEST_TIMEOUT_SECS)?,
                connect_secs: env_parse("API_CONNECT_TIMEOUT_SECS", DEFAULT_API_CONNECT_TIMEOUT_SECS)?,
            },
            token_store_path: std::env::var("TOKEN_STORE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            port: env_parse("PORT", DEFAULT_PORT)?,
        })
    }
}

fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
