use forecast_cache::{
    Coordinate, ForecastError, ForecastService, FreshnessPolicy, LocationStore, OpenMeteoProvider,
};
use httpmock::prelude::*;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

const LONDON: (f64, f64) = (51.5074, -0.1278);

fn two_hour_body() -> serde_json::Value {
    serde_json::json!({
        "latitude": 51.5,
        "longitude": -0.120000124,
        "hourly": {
            "time": ["2024-10-29T00:00", "2024-10-29T01:00"],
            "temperature_2m": [6.2, 5.7],
            "wind_speed_10m": [4.0, 4.7]
        }
    })
}

fn full_day_body() -> serde_json::Value {
    let time: Vec<String> = (0..24).map(|h| format!("2024-10-29T{:02}:00", h)).collect();
    let values: Vec<f64> = (0..24).map(|h| h as f64).collect();
    serde_json::json!({
        "hourly": {
            "time": time,
            "temperature_2m": values,
            "wind_speed_10m": values
        }
    })
}

async fn service_against(server: &MockServer, store: LocationStore) -> ForecastService<OpenMeteoProvider> {
    let provider =
        OpenMeteoProvider::new(server.url("/v1/forecast"), Duration::from_secs(5)).unwrap();
    ForecastService::new(store, provider, FreshnessPolicy::default())
}

#[tokio::test]
async fn test_new_coordinate_is_fetched_and_cached() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/forecast")
                .query_param("latitude", "51.5074")
                .query_param("longitude", "-0.1278")
                .query_param("hourly", "temperature_2m,wind_speed_10m");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(two_hour_body());
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;
    let coordinate = Coordinate::new(LONDON.0, LONDON.1);

    let result = assert_ok!(
        service
            .get_forecast_by_coordinate(coordinate, &CancellationToken::new())
            .await
    );

    api_mock.assert_hits_async(1).await;
    // The requested coordinate is echoed, not the provider's grid point.
    assert_eq!(result.latitude, 51.5074);
    assert_eq!(result.longitude, -0.1278);
    assert_eq!(result.samples.len(), 2);
    assert_eq!(result.samples[0].timestamp.to_rfc3339(), "2024-10-29T00:00:00+00:00");
    assert_eq!(result.samples[1].temperature, 5.7);
    assert_eq!(result.samples[1].wind_speed, 4.7);

    let locations = service.list_locations(&CancellationToken::new()).await.unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].coordinate(), coordinate);
}

#[tokio::test]
async fn test_upstream_failure_writes_nothing() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(500).body("upstream exploded");
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;

    let err = assert_err!(
        service
            .get_forecast_by_coordinate(Coordinate::new(LONDON.0, LONDON.1), &CancellationToken::new())
            .await
    );

    api_mock.assert_hits_async(1).await;
    assert!(matches!(err, ForecastError::UpstreamUnavailable { .. }));
    assert!(service
        .list_locations(&CancellationToken::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_fresh_cache_skips_provider() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(200).json_body(full_day_body());
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;
    let coordinate = Coordinate::new(35.6762, 139.6503);
    let cancel = CancellationToken::new();

    let first = service.get_forecast_by_coordinate(coordinate, &cancel).await.unwrap();
    let second = service.get_forecast_by_coordinate(coordinate, &cancel).await.unwrap();

    api_mock.assert_hits_async(1).await;
    assert_eq!(first, second);
    assert_eq!(second.samples.len(), 24);
}

#[tokio::test]
async fn test_stale_cache_refetches_and_appends() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(200).json_body(two_hour_body());
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;
    let coordinate = Coordinate::new(LONDON.0, LONDON.1);
    let cancel = CancellationToken::new();

    service.get_forecast_by_coordinate(coordinate, &cancel).await.unwrap();
    let second = service.get_forecast_by_coordinate(coordinate, &cancel).await.unwrap();

    api_mock.assert_hits_async(2).await;
    assert_eq!(second.samples.len(), 4);
    assert_eq!(service.list_locations(&cancel).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_forecast_by_location_id() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/forecast")
                .query_param("latitude", "48.8566")
                .query_param("longitude", "2.3522");
            then.status(200).json_body(two_hour_body());
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;
    let cancel = CancellationToken::new();
    let location = service
        .add_location(Coordinate::new(48.8566, 2.3522), &cancel)
        .await
        .unwrap();

    let result = service
        .get_forecast_by_location_id(location.id, &cancel)
        .await
        .unwrap();

    api_mock.assert_hits_async(1).await;
    assert_eq!(result.latitude, 48.8566);
    assert_eq!(result.samples.len(), 2);

    let stored = service.store().find_by_id(location.id).await.unwrap().unwrap();
    assert_eq!(stored.samples.len(), 2);
}

#[tokio::test]
async fn test_unknown_location_id_never_calls_provider() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(200).json_body(two_hour_body());
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;

    let err = service
        .get_forecast_by_location_id(999, &CancellationToken::new())
        .await
        .unwrap_err();

    api_mock.assert_hits_async(0).await;
    assert!(matches!(err, ForecastError::NotFound { id: 999 }));
}

#[tokio::test]
async fn test_cancelled_request_leaves_store_untouched() {
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(two_hour_body());
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = service
        .get_forecast_by_coordinate(Coordinate::new(LONDON.0, LONDON.1), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ForecastError::Cancelled));
    assert!(api_mock.hits_async().await <= 1);
    assert!(service
        .list_locations(&CancellationToken::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cache_survives_reconnect() {
    let temp_dir = TempDir::new().unwrap();
    let url = format!(
        "sqlite://{}",
        temp_dir.path().join("nested").join("weather.db").display()
    );

    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(200).json_body(full_day_body());
        })
        .await;
    let coordinate = Coordinate::new(LONDON.0, LONDON.1);

    {
        let store = LocationStore::connect_url(&url, 2).await.unwrap();
        let service = service_against(&server, store).await;
        service
            .get_forecast_by_coordinate(coordinate, &CancellationToken::new())
            .await
            .unwrap();
    }

    let store = LocationStore::connect_url(&url, 2).await.unwrap();
    let service = service_against(&server, store).await;
    let result = service
        .get_forecast_by_coordinate(coordinate, &CancellationToken::new())
        .await
        .unwrap();

    api_mock.assert_hits_async(1).await;
    assert_eq!(result.samples.len(), 24);
}

#[tokio::test]
async fn test_register_then_forecast_scenario() {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M").to_string();
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(200).json_body(serde_json::json!({
                "hourly": {
                    "time": [now],
                    "temperature_2m": [11.5],
                    "wind_speed_10m": [9.0]
                }
            }));
        })
        .await;

    let service = service_against(&server, LocationStore::in_memory().await.unwrap()).await;
    let cancel = CancellationToken::new();
    let coordinate = Coordinate::new(LONDON.0, LONDON.1);

    let location = assert_ok!(service.add_location(coordinate, &cancel).await);
    let err = assert_err!(service.add_location(coordinate, &cancel).await);
    assert!(matches!(err, ForecastError::AlreadyExists { .. }));

    let first = service
        .get_forecast_by_location_id(location.id, &cancel)
        .await
        .unwrap();
    assert_eq!(first.samples.len(), 1);
    assert_eq!(first.samples[0].temperature, 11.5);

    // One past sample is far below the threshold, so the next call fetches again.
    let second = service
        .get_forecast_by_coordinate(coordinate, &cancel)
        .await
        .unwrap();
    api_mock.assert_hits_async(2).await;
    assert_eq!(second.samples.len(), 2);
    assert_eq!(service.list_locations(&cancel).await.unwrap().len(), 1);
}

async fn file_backed_store(dir: &TempDir) -> LocationStore {
    let url = format!("sqlite://{}", dir.path().join("weather.db").display());
    LocationStore::connect_url(&url, 5).await.unwrap()
}

async fn slow_forecast_mock(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forecast");
            then.status(200)
                .delay(Duration::from_millis(200))
                .json_body(two_hour_body());
        })
        .await
}

#[tokio::test]
async fn test_concurrent_misses_for_distinct_coordinates_both_succeed() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let api_mock = slow_forecast_mock(&server).await;

    let service = service_against(&server, file_backed_store(&temp_dir).await).await;
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(
        service.get_forecast_by_coordinate(Coordinate::new(1.0, 1.0), &cancel),
        service.get_forecast_by_coordinate(Coordinate::new(2.0, 2.0), &cancel),
    );

    let first = assert_ok!(first);
    let second = assert_ok!(second);
    assert_eq!(first.samples.len(), 2);
    assert_eq!(second.samples.len(), 2);
    api_mock.assert_hits_async(2).await;
    assert_eq!(service.list_locations(&cancel).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_misses_for_one_coordinate_share_a_location() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let api_mock = slow_forecast_mock(&server).await;

    let service = service_against(&server, file_backed_store(&temp_dir).await).await;
    let cancel = CancellationToken::new();
    let coordinate = Coordinate::new(LONDON.0, LONDON.1);

    let (first, second) = tokio::join!(
        service.get_forecast_by_coordinate(coordinate, &cancel),
        service.get_forecast_by_coordinate(coordinate, &cancel),
    );

    assert_ok!(first);
    assert_ok!(second);
    // Both miss, so both fetch; the second appends to the location the first created.
    api_mock.assert_hits_async(2).await;
    let locations = service.list_locations(&cancel).await.unwrap();
    assert_eq!(locations.len(), 1);
    let stored = service.store().find_by_id(locations[0].id).await.unwrap().unwrap();
    assert_eq!(stored.samples.len(), 4);
}

#[tokio::test]
async fn test_add_location_while_forecast_is_fetching() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let api_mock = slow_forecast_mock(&server).await;

    let service = service_against(&server, file_backed_store(&temp_dir).await).await;
    let cancel = CancellationToken::new();

    let (forecast, added) = tokio::join!(
        service.get_forecast_by_coordinate(Coordinate::new(LONDON.0, LONDON.1), &cancel),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            service
                .add_location(Coordinate::new(48.8566, 2.3522), &cancel)
                .await
        },
    );

    assert_ok!(forecast);
    let added = assert_ok!(added);
    api_mock.assert_hits_async(1).await;

    let locations = service.list_locations(&cancel).await.unwrap();
    assert_eq!(locations.len(), 2);
    assert!(locations.iter().any(|l| l.id == added.id));
}
