use crate::config::toml_config::TomlConfig;
use crate::config::ServiceConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "forecast-cache")]
#[command(about = "Caching front for hourly weather forecasts", version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true, env = "FORECAST_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "FORECAST_DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, global = true, env = "FORECAST_PROVIDER_ENDPOINT")]
    pub provider_endpoint: Option<String>,

    #[arg(long, global = true, env = "FORECAST_FRESHNESS_THRESHOLD")]
    pub freshness_threshold: Option<usize>,

    #[arg(long, global = true, env = "FORECAST_BIND_ADDRESS")]
    pub bind_address: Option<SocketAddr>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API until interrupted
    Serve,
    /// Print the forecast for a coordinate, fetching it if the cache is stale
    Forecast {
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Manage registered locations
    Locations {
        #[command(subcommand)]
        action: LocationsCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum LocationsCommand {
    List,
    Add {
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
    },
    Show {
        id: i64,
    },
    Delete {
        id: i64,
    },
    /// Print the forecast for a registered location
    Forecast {
        id: i64,
    },
}

impl Cli {
    /// Defaults, then the config file, then flags and their environment variables.
    pub fn resolve_config(&self) -> Result<ServiceConfig> {
        let base = match &self.config {
            Some(path) => TomlConfig::from_file(path)?.apply_to(ServiceConfig::default())?,
            None => ServiceConfig::default(),
        };

        let config = self.apply_to(base);
        config.validate()?;
        Ok(config)
    }

    fn apply_to(&self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(endpoint) = &self.provider_endpoint {
            config.provider_endpoint = endpoint.clone();
        }
        if let Some(threshold) = self.freshness_threshold {
            config.freshness_threshold = threshold;
        }
        if let Some(address) = self.bind_address {
            config.bind_address = address;
        }
        if self.json_logs {
            config.json_logs = true;
        }
        config
    }
}
