//! Read-through forecast cache.
//!
//! A forecast request is served from the location store while its samples are
//! fresh, and otherwise fetched from the provider, written back and returned,
//! all inside one store transaction.

use crate::adapters::open_meteo::OpenMeteoProvider;
use crate::adapters::store::{LocationStore, StoreTransaction};
use crate::core::freshness::FreshnessPolicy;
use crate::core::mapping::map_hourly_series;
use crate::domain::model::{Coordinate, ForecastResult, LocationSummary};
use crate::domain::ports::{ConfigProvider, ForecastProvider};
use crate::utils::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq)]
enum LocationKey {
    Coordinate(Coordinate),
    Id(i64),
}

pub struct ForecastService<P: ForecastProvider> {
    store: LocationStore,
    provider: Arc<P>,
    policy: FreshnessPolicy,
    clock: fn() -> DateTime<Utc>,
}

impl ForecastService<OpenMeteoProvider> {
    pub async fn from_config(config: &impl ConfigProvider) -> Result<Self> {
        let store = LocationStore::connect(config).await?;
        let provider = OpenMeteoProvider::from_config(config)?;
        Ok(Self::new(
            store,
            provider,
            FreshnessPolicy::new(config.freshness_threshold()),
        ))
    }
}

impl<P: ForecastProvider + 'static> ForecastService<P> {
    pub fn new(store: LocationStore, provider: P, policy: FreshnessPolicy) -> Self {
        Self {
            store,
            provider: Arc::new(provider),
            policy,
            clock: Utc::now,
        }
    }

    /// Replaces the wall clock used by the freshness check.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &LocationStore {
        &self.store
    }

    /// Forecast for a coordinate, registering the location if the fetch succeeds.
    pub async fn get_forecast_by_coordinate(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> Result<ForecastResult> {
        self.forecast(LocationKey::Coordinate(coordinate), cancel)
            .await
    }

    pub async fn get_forecast_by_location_id(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<ForecastResult> {
        self.forecast(LocationKey::Id(id), cancel).await
    }

    pub async fn add_location(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> Result<LocationSummary> {
        cancellable(cancel, async {
            if self.store.exists_by_coordinate(coordinate).await? {
                return Err(ForecastError::AlreadyExists {
                    latitude: coordinate.latitude,
                    longitude: coordinate.longitude,
                });
            }

            let location = self.store.create(coordinate).await?;
            tracing::info!(
                "Registered location {} at ({}, {})",
                location.id,
                coordinate.latitude,
                coordinate.longitude
            );
            Ok(location.summary())
        })
        .await
    }

    pub async fn get_location(&self, id: i64, cancel: &CancellationToken) -> Result<LocationSummary> {
        cancellable(cancel, async {
            self.store
                .find_by_id(id)
                .await?
                .map(|location| location.summary())
                .ok_or(ForecastError::NotFound { id })
        })
        .await
    }

    pub async fn list_locations(&self, cancel: &CancellationToken) -> Result<Vec<LocationSummary>> {
        cancellable(cancel, self.store.list_all()).await
    }

    /// Returns whether a location was removed. Its samples go with it.
    pub async fn delete_location(&self, id: i64, cancel: &CancellationToken) -> Result<bool> {
        let deleted = cancellable(cancel, self.store.delete(id)).await?;
        if deleted {
            tracing::info!("Deleted location {}", id);
        } else {
            tracing::debug!("No location {} to delete", id);
        }
        Ok(deleted)
    }

    async fn forecast(&self, key: LocationKey, cancel: &CancellationToken) -> Result<ForecastResult> {
        let provider = Arc::clone(&self.provider);
        let policy = self.policy;
        let now = (self.clock)();

        let work = self.store.run_in_transaction::<ForecastResult, _>(move |tx| {
            Box::pin(async move { read_through(tx, &*provider, policy, now, key).await })
        });

        let result = cancellable(cancel, work).await;
        if let Err(e) = &result {
            tracing::warn!("Forecast for {:?} failed: {}", key, e);
        }
        result
    }
}

async fn read_through<P: ForecastProvider>(
    tx: &mut StoreTransaction,
    provider: &P,
    policy: FreshnessPolicy,
    now: DateTime<Utc>,
    key: LocationKey,
) -> Result<ForecastResult> {
    let (coordinate, existing) = match key {
        LocationKey::Coordinate(coordinate) => (coordinate, tx.find_by_coordinate(coordinate).await?),
        LocationKey::Id(id) => {
            let location = tx
                .find_by_id(id)
                .await?
                .ok_or(ForecastError::NotFound { id })?;
            (location.coordinate, Some(location))
        }
    };

    // A location that is not stored yet has no samples, so it is never fresh.
    if let Some(location) = &existing {
        if policy.is_fresh(&location.samples, now) {
            tracing::debug!(
                "Serving {} cached samples for location {}",
                location.samples.len(),
                location.id
            );
            return Ok(ForecastResult::from_samples(coordinate, &location.samples));
        }
    }

    tracing::info!(
        "Cache miss for ({}, {}) with fewer than {} past samples, fetching forecast",
        coordinate.latitude,
        coordinate.longitude,
        policy.threshold()
    );
    let series = provider.fetch_hourly(coordinate).await?;
    let samples = map_hourly_series(&series)?;

    let location_id = match existing {
        Some(location) => location.id,
        None => tx.create(coordinate).await?.id,
    };
    tx.add_samples(location_id, &samples).await?;
    tracing::debug!("Stored {} samples for location {}", samples.len(), location_id);

    let stored = tx.samples_for(location_id).await?;
    Ok(ForecastResult::from_samples(coordinate, &stored))
}

/// Races `work` against `cancel`. Dropping the unfinished work drops any open
/// transaction with it, which rolls the transaction back.
async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ForecastError::Cancelled),
        result = work => result,
    }
}
