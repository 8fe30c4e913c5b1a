use crate::domain::model::{Coordinate, HourlySeries};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

/// Source of hourly forecasts for a coordinate.
///
/// Implementations report transport failures and non-success statuses as
/// `UpstreamUnavailable`, and unreadable bodies as `UpstreamMalformed`.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch_hourly(&self, coordinate: Coordinate) -> Result<HourlySeries>;
}

pub trait ConfigProvider: Send + Sync {
    fn database_url(&self) -> &str;
    fn max_connections(&self) -> u32;
    fn provider_endpoint(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn freshness_threshold(&self) -> usize;
    fn bind_address(&self) -> SocketAddr;
}
