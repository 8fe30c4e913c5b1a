pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;
pub use config::ServiceConfig;

pub use adapters::open_meteo::OpenMeteoProvider;
pub use adapters::store::LocationStore;
pub use core::{freshness::FreshnessPolicy, service::ForecastService};
pub use domain::model::{Coordinate, ForecastEntry, ForecastResult, LocationSummary};
pub use utils::error::{ForecastError, Result};
