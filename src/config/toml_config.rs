use crate::config::ServiceConfig;
use crate::utils::error::{ForecastError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// On-disk configuration. Every section and key is optional; whatever is
/// present overrides the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database: Option<DatabaseSection>,
    pub provider: Option<ProviderSection>,
    pub cache: Option<CacheSection>,
    pub server: Option<ServerSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSection {
    pub freshness_threshold: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        tracing::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| ForecastError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ForecastError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    /// Layers the file's settings over `base`.
    pub fn apply_to(&self, mut base: ServiceConfig) -> Result<ServiceConfig> {
        if let Some(database) = &self.database {
            if let Some(url) = &database.url {
                base.database_url = url.clone();
            }
            if let Some(max) = database.max_connections {
                base.max_connections = max;
            }
        }

        if let Some(provider) = &self.provider {
            if let Some(endpoint) = &provider.endpoint {
                base.provider_endpoint = endpoint.clone();
            }
            if let Some(timeout) = provider.timeout_seconds {
                base.timeout_seconds = timeout;
            }
        }

        if let Some(threshold) = self.cache.as_ref().and_then(|c| c.freshness_threshold) {
            base.freshness_threshold = threshold;
        }

        if let Some(address) = self.server.as_ref().and_then(|s| s.bind_address.as_deref()) {
            base.bind_address = parse_bind_address(address)?;
        }

        if let Some(logging) = &self.logging {
            if logging.level.is_some() {
                base.log_level = logging.level.clone();
            }
            if let Some(json) = logging.json {
                base.json_logs = json;
            }
        }

        Ok(base)
    }
}

fn parse_bind_address(value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e: std::net::AddrParseError| ForecastError::InvalidConfigValueError {
            field: "server.bind_address".to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
