use crate::domain::model::WeatherSample;
use chrono::{DateTime, Utc};

pub const DEFAULT_FRESHNESS_THRESHOLD: usize = 24;

/// Decides whether stored samples can be served without asking the provider.
///
/// Cached data is fresh when at least `threshold` samples are dated at or
/// before `now`. This counts past samples; it is not a time-to-live on the
/// last fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    threshold: usize,
}

impl FreshnessPolicy {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_fresh(&self, samples: &[WeatherSample], now: DateTime<Utc>) -> bool {
        if samples.is_empty() {
            return false;
        }
        let past = samples.iter().filter(|s| s.timestamp <= now).count();
        past >= self.threshold
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS_THRESHOLD)
    }
}
