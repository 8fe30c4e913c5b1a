use crate::core::service::ForecastService;
use crate::domain::model::{Coordinate, ForecastResult};
use crate::domain::ports::ForecastProvider;
use crate::utils::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const FORECAST_NOT_FOUND: &str = "Location or forecast not found.";

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CoordinateParams {
    pub latitude: f64,
    pub longitude: f64,
}

impl CoordinateParams {
    fn validated(self) -> Result<Coordinate> {
        Coordinate::checked(self.latitude, self.longitude)
    }
}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

struct Context<P: ForecastProvider> {
    service: Arc<ForecastService<P>>,
    shutdown: CancellationToken,
}

impl<P: ForecastProvider> Clone for Context<P> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<P: ForecastProvider> Context<P> {
    /// Per-request token; the root is cancelled on shutdown.
    fn cancel_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

pub fn routes<P: ForecastProvider + 'static>(
    service: Arc<ForecastService<P>>,
    shutdown: CancellationToken,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let ctx = Context { service, shutdown };

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(health::<P>);

    let forecast = warp::path!("forecast")
        .and(warp::get())
        .and(warp::query::<CoordinateParams>())
        .and(with_context(ctx.clone()))
        .and_then(forecast_by_coordinate::<P>);

    let list_locations = warp::path!("locations")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(list_locations::<P>);

    let add_location = warp::path!("locations")
        .and(warp::post())
        .and(warp::body::json::<CoordinateParams>())
        .and(with_context(ctx.clone()))
        .and_then(add_location::<P>);

    let get_location = warp::path!("locations" / i64)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(get_location::<P>);

    let delete_location = warp::path!("locations" / i64)
        .and(warp::delete())
        .and(with_context(ctx.clone()))
        .and_then(delete_location::<P>);

    let location_forecast = warp::path!("locations" / i64 / "forecast")
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(forecast_by_location_id::<P>);

    health
        .or(forecast)
        .or(list_locations)
        .or(add_location)
        .or(get_location)
        .or(delete_location)
        .or(location_forecast)
        .recover(rejection)
        .with(warp::log("forecast_cache::http"))
}

pub async fn serve<P: ForecastProvider + 'static>(
    service: Arc<ForecastService<P>>,
    address: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let routes = routes(service, shutdown.clone());

    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(address, async move { shutdown.cancelled().await })
        .map_err(|e| ForecastError::ConfigError {
            message: format!("Cannot listen on {}: {}", address, e),
        })?;

    tracing::info!("Listening on http://{}", bound);
    server.await;
    tracing::info!("Server stopped");
    Ok(())
}

fn with_context<P: ForecastProvider + 'static>(
    ctx: Context<P>,
) -> impl Filter<Extract = (Context<P>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn json_reply<T: Serialize>(body: &T, code: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), code).into_response()
}

fn error_reply(code: StatusCode, message: impl Into<String>) -> Response {
    json_reply(
        &ErrorMessage {
            code: code.as_u16(),
            message: message.into(),
        },
        code,
    )
}

fn internal_error(e: &ForecastError) -> Response {
    tracing::error!("Request failed: {}", e);
    match e {
        ForecastError::Cancelled => error_reply(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down."),
        _ => error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."),
    }
}

/// Every forecast failure surfaces as the same 404; the cause is only logged.
fn forecast_reply(result: Result<ForecastResult>) -> Response {
    match result {
        Ok(forecast) => json_reply(&forecast, StatusCode::OK),
        Err(ForecastError::Cancelled) => internal_error(&ForecastError::Cancelled),
        Err(e) => {
            tracing::info!("Forecast unavailable ({:?}): {}", e.category(), e);
            error_reply(StatusCode::NOT_FOUND, FORECAST_NOT_FOUND)
        }
    }
}

async fn health<P: ForecastProvider + 'static>(ctx: Context<P>) -> std::result::Result<Response, Rejection> {
    Ok(match ctx.service.store().ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(&e),
    })
}

async fn forecast_by_coordinate<P: ForecastProvider + 'static>(
    params: CoordinateParams,
    ctx: Context<P>,
) -> std::result::Result<Response, Rejection> {
    let coordinate = match params.validated() {
        Ok(coordinate) => coordinate,
        Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, e.user_friendly_message())),
    };

    let cancel = ctx.cancel_token();
    Ok(forecast_reply(
        ctx.service.get_forecast_by_coordinate(coordinate, &cancel).await,
    ))
}

async fn forecast_by_location_id<P: ForecastProvider + 'static>(
    id: i64,
    ctx: Context<P>,
) -> std::result::Result<Response, Rejection> {
    let cancel = ctx.cancel_token();
    Ok(forecast_reply(
        ctx.service.get_forecast_by_location_id(id, &cancel).await,
    ))
}

async fn add_location<P: ForecastProvider + 'static>(
    params: CoordinateParams,
    ctx: Context<P>,
) -> std::result::Result<Response, Rejection> {
    let coordinate = match params.validated() {
        Ok(coordinate) => coordinate,
        Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, e.user_friendly_message())),
    };

    let cancel = ctx.cancel_token();
    Ok(match ctx.service.add_location(coordinate, &cancel).await {
        Ok(location) => json_reply(&location, StatusCode::OK),
        Err(ForecastError::AlreadyExists { .. }) => {
            error_reply(StatusCode::BAD_REQUEST, "Unable to create location")
        }
        Err(e) => internal_error(&e),
    })
}

async fn get_location<P: ForecastProvider + 'static>(
    id: i64,
    ctx: Context<P>,
) -> std::result::Result<Response, Rejection> {
    let cancel = ctx.cancel_token();
    Ok(match ctx.service.get_location(id, &cancel).await {
        Ok(location) => json_reply(&location, StatusCode::OK),
        Err(ForecastError::NotFound { .. }) => {
            error_reply(StatusCode::NOT_FOUND, "Location with provided id not found")
        }
        Err(e) => internal_error(&e),
    })
}

async fn list_locations<P: ForecastProvider + 'static>(
    ctx: Context<P>,
) -> std::result::Result<Response, Rejection> {
    let cancel = ctx.cancel_token();
    Ok(match ctx.service.list_locations(&cancel).await {
        Ok(locations) => json_reply(&locations, StatusCode::OK),
        Err(e) => internal_error(&e),
    })
}

async fn delete_location<P: ForecastProvider + 'static>(
    id: i64,
    ctx: Context<P>,
) -> std::result::Result<Response, Rejection> {
    let cancel = ctx.cancel_token();
    Ok(match ctx.service.delete_location(id, &cancel).await {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => error_reply(
            StatusCode::BAD_REQUEST,
            "Unable to delete location with provided Id",
        ),
        Err(e) => internal_error(&e),
    })
}

async fn rejection(err: Rejection) -> std::result::Result<Response, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found.".to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.".to_string())
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error.".to_string(),
        )
    };

    Ok(error_reply(code, message))
}
