use crate::domain::model::{Coordinate, HourlySeries};
use crate::domain::ports::{ConfigProvider, ForecastProvider};
use crate::utils::error::{ForecastError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";
const HOURLY_VARIABLES: &str = "temperature_2m,wind_speed_10m";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    hourly: Option<HourlyResponse>,
}

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    time: Option<Vec<String>>,
    temperature_2m: Option<Vec<Option<f64>>>,
    wind_speed_10m: Option<Vec<Option<f64>>>,
}

impl From<ForecastResponse> for HourlySeries {
    fn from(response: ForecastResponse) -> Self {
        match response.hourly {
            Some(hourly) => HourlySeries {
                time: hourly.time.unwrap_or_default(),
                temperature: hourly.temperature_2m.unwrap_or_default(),
                wind_speed: hourly.wind_speed_10m.unwrap_or_default(),
            },
            None => HourlySeries::default(),
        }
    }
}

/// Open-Meteo forecast API client.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Client,
    endpoint: String,
}

impl OpenMeteoProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForecastError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &impl ConfigProvider) -> Result<Self> {
        Self::new(config.provider_endpoint(), config.request_timeout())
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    async fn fetch_hourly(&self, coordinate: Coordinate) -> Result<HourlySeries> {
        tracing::debug!(
            "Requesting forecast for ({}, {}) from {}",
            coordinate.latitude,
            coordinate.longitude,
            self.endpoint
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("latitude", coordinate.latitude.to_string()),
                ("longitude", coordinate.longitude.to_string()),
                ("timezone", "UTC".to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ForecastError::UpstreamUnavailable {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        tracing::debug!("Provider response status: {}", status);

        if !status.is_success() {
            return Err(ForecastError::UpstreamUnavailable {
                message: format!("Provider returned status {}", status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::UpstreamUnavailable {
                message: format!("Failed to read response body: {}", e),
            })?;

        let parsed: ForecastResponse =
            serde_json::from_str(&body).map_err(|e| ForecastError::UpstreamMalformed {
                message: e.to_string(),
            })?;

        // Open-Meteo snaps the request to its nearest grid cell.
        tracing::debug!(
            "Provider answered for grid point ({:?}, {:?})",
            parsed.latitude,
            parsed.longitude
        );

        Ok(parsed.into())
    }
}
