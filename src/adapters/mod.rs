// Adapters layer: concrete implementations for external systems (database, forecast API, http).

pub mod http;
pub mod open_meteo;
pub mod store;
