#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::open_meteo::DEFAULT_ENDPOINT;
use crate::core::freshness::DEFAULT_FRESHNESS_THRESHOLD;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::logger::{DEFAULT_DIRECTIVE, VERBOSE_DIRECTIVE};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_url, Validate,
};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/weather.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_PORT: u16 = 8080;

/// Fully resolved settings for the service.
///
/// Built from the defaults, then layered with a TOML file and finally with
/// command line flags or their environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub provider_endpoint: String,
    pub timeout_seconds: u64,
    pub freshness_threshold: usize,
    pub bind_address: SocketAddr,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            provider_endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            freshness_threshold: DEFAULT_FRESHNESS_THRESHOLD,
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            log_level: None,
            json_logs: false,
        }
    }
}

impl ServiceConfig {
    /// Filter directive for the logger. `verbose` overrides the configured level.
    pub fn log_directive(&self, verbose: bool) -> String {
        if verbose {
            return VERBOSE_DIRECTIVE.to_string();
        }
        self.log_level
            .clone()
            .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
    }
}

impl ConfigProvider for ServiceConfig {
    fn database_url(&self) -> &str {
        &self.database_url
    }

    fn max_connections(&self) -> u32 {
        self.max_connections
    }

    fn provider_endpoint(&self) -> &str {
        &self.provider_endpoint
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn freshness_threshold(&self) -> usize {
        self.freshness_threshold
    }

    fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("database.url", &self.database_url)?;
        validate_positive_number("database.max_connections", self.max_connections as usize, 1)?;
        validate_url("provider.endpoint", &self.provider_endpoint)?;
        validate_positive_number("provider.timeout_seconds", self.timeout_seconds as usize, 1)?;
        validate_positive_number("cache.freshness_threshold", self.freshness_threshold, 1)?;
        Ok(())
    }
}
