pub mod freshness;
pub mod mapping;
pub mod service;

pub use crate::domain::model::{Coordinate, ForecastResult, LocationSummary};
pub use crate::domain::ports::{ConfigProvider, ForecastProvider};
pub use crate::utils::error::Result;
