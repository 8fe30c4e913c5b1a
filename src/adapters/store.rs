//! SQLite-backed location store.
//!
//! Every query is written once against a plain `SqliteConnection`, so the same
//! code serves pooled connections and open transactions.

use crate::domain::model::{Coordinate, Location, LocationSummary, NewWeatherSample, WeatherSample};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

/// Future returned by the work closure of [`LocationStore::run_in_transaction`].
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 't>>;

// SQLite caps bound parameters per statement; four binds per sample row.
const SAMPLE_INSERT_CHUNK: usize = 500;

/// How long a writer waits for the database lock when no provider timeout is known.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct LocationStore {
    pool: SqlitePool,
}

impl LocationStore {
    pub async fn connect(config: &impl ConfigProvider) -> Result<Self> {
        Self::connect_with_busy_timeout(
            config.database_url(),
            config.max_connections(),
            busy_timeout_for(config.request_timeout()),
        )
        .await
    }

    pub async fn connect_url(database_url: &str, max_connections: u32) -> Result<Self> {
        Self::connect_with_busy_timeout(database_url, max_connections, DEFAULT_BUSY_TIMEOUT).await
    }

    /// `busy_timeout` bounds how long a writer queues behind another open
    /// transaction, which may be waiting on a provider fetch.
    pub async fn connect_with_busy_timeout(
        database_url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool = if is_memory_url(database_url) {
            // Each connection to an in-memory database sees its own empty database.
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("Location store ready at {}", database_url);

        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect_url("sqlite::memory:", 1).await
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Takes the write lock up front, so concurrent writers queue on the busy
    /// timeout rather than failing on lock upgrade.
    pub async fn begin(&self) -> Result<StoreTransaction> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(StoreTransaction { tx })
    }

    /// Runs `work` inside one transaction: committed when it returns `Ok`,
    /// rolled back before the error is returned otherwise.
    pub async fn run_in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut StoreTransaction) -> TxFuture<'t, T> + Send,
    {
        let mut tx = self.begin().await?;
        let outcome = work(&mut tx).await;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback failed after '{}': {}", e, rollback_err);
                } else {
                    tracing::debug!("Transaction rolled back: {}", e);
                }
                Err(e)
            }
        }
    }

    pub async fn find_by_coordinate(&self, coordinate: Coordinate) -> Result<Option<Location>> {
        let mut conn = self.pool.acquire().await?;
        find_by_coordinate(&mut conn, coordinate).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Location>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    pub async fn exists_by_coordinate(&self, coordinate: Coordinate) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        exists_by_coordinate(&mut conn, coordinate).await
    }

    pub async fn list_all(&self) -> Result<Vec<LocationSummary>> {
        let mut conn = self.pool.acquire().await?;
        list_all(&mut conn).await
    }

    pub async fn create(&self, coordinate: Coordinate) -> Result<Location> {
        let mut conn = self.pool.acquire().await?;
        create(&mut conn, coordinate).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        delete(&mut conn, id).await
    }

    pub async fn add_samples(&self, location_id: i64, samples: &[NewWeatherSample]) -> Result<()> {
        // Chunked inserts must land together.
        let mut tx = self.begin().await?;
        tx.add_samples(location_id, samples).await?;
        tx.commit().await
    }
}

/// An open transaction. Dropping it without `commit` rolls it back.
pub struct StoreTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl StoreTransaction {
    pub async fn find_by_coordinate(&mut self, coordinate: Coordinate) -> Result<Option<Location>> {
        find_by_coordinate(&mut self.tx, coordinate).await
    }

    pub async fn find_by_id(&mut self, id: i64) -> Result<Option<Location>> {
        find_by_id(&mut self.tx, id).await
    }

    pub async fn create(&mut self, coordinate: Coordinate) -> Result<Location> {
        create(&mut self.tx, coordinate).await
    }

    pub async fn add_samples(&mut self, location_id: i64, samples: &[NewWeatherSample]) -> Result<()> {
        add_samples(&mut self.tx, location_id, samples).await
    }

    pub async fn samples_for(&mut self, location_id: i64) -> Result<Vec<WeatherSample>> {
        samples_for(&mut self.tx, location_id).await
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Twice the provider timeout plus slack, so a queued writer outlasts one full fetch.
pub fn busy_timeout_for(request_timeout: Duration) -> Duration {
    (request_timeout * 2 + Duration::from_secs(5)).max(DEFAULT_BUSY_TIMEOUT)
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

async fn find_by_coordinate(
    conn: &mut SqliteConnection,
    coordinate: Coordinate,
) -> Result<Option<Location>> {
    let summary = sqlx::query_as::<_, LocationSummary>(
        "SELECT id, latitude, longitude FROM locations \
         WHERE latitude = ? AND longitude = ? \
         ORDER BY id LIMIT 1",
    )
    .bind(coordinate.latitude)
    .bind(coordinate.longitude)
    .fetch_optional(&mut *conn)
    .await?;

    with_samples(conn, summary).await
}

async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Location>> {
    let summary = sqlx::query_as::<_, LocationSummary>(
        "SELECT id, latitude, longitude FROM locations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    with_samples(conn, summary).await
}

async fn with_samples(
    conn: &mut SqliteConnection,
    summary: Option<LocationSummary>,
) -> Result<Option<Location>> {
    match summary {
        Some(summary) => {
            let samples = samples_for(conn, summary.id).await?;
            Ok(Some(Location {
                id: summary.id,
                coordinate: summary.coordinate(),
                samples,
            }))
        }
        None => Ok(None),
    }
}

async fn samples_for(conn: &mut SqliteConnection, location_id: i64) -> Result<Vec<WeatherSample>> {
    let samples = sqlx::query_as::<_, WeatherSample>(
        "SELECT id, location_id, timestamp, temperature, wind_speed FROM weather_samples \
         WHERE location_id = ? \
         ORDER BY timestamp, id",
    )
    .bind(location_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(samples)
}

async fn exists_by_coordinate(conn: &mut SqliteConnection, coordinate: Coordinate) -> Result<bool> {
    let found: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM locations WHERE latitude = ? AND longitude = ?)",
    )
    .bind(coordinate.latitude)
    .bind(coordinate.longitude)
    .fetch_one(&mut *conn)
    .await?;
    Ok(found != 0)
}

async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<LocationSummary>> {
    let locations = sqlx::query_as::<_, LocationSummary>(
        "SELECT id, latitude, longitude FROM locations ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(locations)
}

async fn create(conn: &mut SqliteConnection, coordinate: Coordinate) -> Result<Location> {
    let result = sqlx::query("INSERT INTO locations (latitude, longitude) VALUES (?, ?)")
        .bind(coordinate.latitude)
        .bind(coordinate.longitude)
        .execute(&mut *conn)
        .await?;

    Ok(Location {
        id: result.last_insert_rowid(),
        coordinate,
        samples: Vec::new(),
    })
}

async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    // weather_samples rows go with it through ON DELETE CASCADE.
    let result = sqlx::query("DELETE FROM locations WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn add_samples(
    conn: &mut SqliteConnection,
    location_id: i64,
    samples: &[NewWeatherSample],
) -> Result<()> {
    for chunk in samples.chunks(SAMPLE_INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO weather_samples (location_id, timestamp, temperature, wind_speed) ",
        );
        builder.push_values(chunk, |mut row, sample| {
            row.push_bind(location_id)
                .push_bind(sample.timestamp)
                .push_bind(sample.temperature)
                .push_bind(sample.wind_speed);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}
