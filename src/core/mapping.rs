use crate::domain::model::{HourlySeries, NewWeatherSample};
use crate::utils::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

// Open-Meteo returns minute precision; seconds appear with some other hosts.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Zips the parallel hourly sequences into samples, index by index.
///
/// A missing or null temperature/wind value becomes `0.0`. A timestamp that
/// cannot be parsed fails the whole mapping.
pub fn map_hourly_series(series: &HourlySeries) -> Result<Vec<NewWeatherSample>> {
    series
        .time
        .iter()
        .enumerate()
        .map(|(index, time)| {
            Ok(NewWeatherSample {
                timestamp: parse_timestamp(time)?,
                temperature: value_at(&series.temperature, index),
                wind_speed: value_at(&series.wind_speed, index),
            })
        })
        .collect()
}

fn value_at(values: &[Option<f64>], index: usize) -> f64 {
    values.get(index).copied().flatten().unwrap_or(0.0)
}

/// Naive timestamps are UTC because the provider is queried with `timezone=UTC`.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ForecastError::UpstreamMalformed {
            message: format!("Unrecognised timestamp '{}'", raw),
        })
}
