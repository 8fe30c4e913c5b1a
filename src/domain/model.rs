use crate::utils::error::Result;
use crate::utils::validation::validate_range;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Natural key of a location. Matched by exact float equality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a coordinate after checking it lies on the globe.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self> {
        validate_range("latitude", latitude, -90.0, 90.0)?;
        validate_range("longitude", longitude, -180.0, 180.0)?;
        Ok(Self::new(latitude, longitude))
    }
}

/// A registered location together with every sample stored for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: i64,
    pub coordinate: Coordinate,
    pub samples: Vec<WeatherSample>,
}

impl Location {
    pub fn summary(&self) -> LocationSummary {
        LocationSummary {
            id: self.id,
            latitude: self.coordinate.latitude,
            longitude: self.coordinate.longitude,
        }
    }
}

/// Location without its samples, as returned by the location endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocationSummary {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationSummary {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeatherSample {
    pub id: i64,
    pub location_id: i64,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub wind_speed: f64,
}

/// A sample mapped from the provider, not yet tied to a stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeatherSample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub wind_speed: f64,
}

/// Provider output: parallel hourly sequences aligned by index.
///
/// Values may be missing (`None`) or the value sequences may be shorter than
/// `time`; mapping substitutes zero in both cases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature: Vec<Option<f64>>,
    pub wind_speed: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub wind_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub latitude: f64,
    pub longitude: f64,
    pub samples: Vec<ForecastEntry>,
}

impl ForecastResult {
    pub fn from_samples(coordinate: Coordinate, samples: &[WeatherSample]) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            samples: samples
                .iter()
                .map(|s| ForecastEntry {
                    timestamp: s.timestamp,
                    temperature: s.temperature,
                    wind_speed: s.wind_speed,
                })
                .collect(),
        }
    }
}
