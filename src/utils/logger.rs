use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_DIRECTIVE: &str = "forecast_cache=info,warn";
pub const VERBOSE_DIRECTIVE: &str = "forecast_cache=debug,info";

/// `RUST_LOG` wins over the configured directive.
fn filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
    })
}

pub fn init_cli_logger(directive: &str) {
    tracing_subscriber::registry()
        .with(filter(directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON lines for the long-running server, where logs are shipped to a collector.
pub fn init_json_logger(directive: &str) {
    tracing_subscriber::registry()
        .with(filter(directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}

pub fn init_logger(directive: &str, json: bool) {
    if json {
        init_json_logger(directive);
    } else {
        init_cli_logger(directive);
    }
}
