use crate::utils::error::{ForecastError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ForecastError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN fails both comparisons, so check containment rather than exclusion.
    if !(value >= min && value <= max) {
        return Err(ForecastError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("provider.endpoint", "https://api.open-meteo.com/v1/forecast").is_ok());
        assert!(validate_url("provider.endpoint", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("provider.endpoint", "").is_err());
        assert!(validate_url("provider.endpoint", "invalid-url").is_err());
        assert!(validate_url("provider.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("cache.freshness_threshold", 24, 1).is_ok());
        assert!(validate_positive_number("cache.freshness_threshold", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range_rejects_nan() {
        assert!(validate_range("latitude", 51.5, -90.0, 90.0).is_ok());
        assert!(validate_range("latitude", 90.0, -90.0, 90.0).is_ok());
        assert!(validate_range("latitude", 90.5, -90.0, 90.0).is_err());
        assert!(validate_range("latitude", f64::NAN, -90.0, 90.0).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("database.url", "sqlite::memory:").is_ok());
        assert!(validate_non_empty_string("database.url", "   ").is_err());
    }
}
