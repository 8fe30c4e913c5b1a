use anyhow::Context;
use clap::Parser;
use forecast_cache::adapters::http;
use forecast_cache::config::cli::{Command, LocationsCommand};
use forecast_cache::utils::logger;
use forecast_cache::{Cli, Coordinate, ForecastError, ForecastService, ServiceConfig};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    logger::init_logger(&config.log_directive(cli.verbose), config.json_logs);
    tracing::info!("Starting forecast-cache");
    tracing::debug!("Resolved config: {:?}", config);

    match run(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ForecastError>() {
                Some(err) => {
                    tracing::error!("❌ {:#} (Category: {:?})", e, err.category());
                    eprintln!("❌ {}", err.user_friendly_message());
                    eprintln!("💡 Suggestion: {}", err.recovery_suggestion());
                    ExitCode::from(err.exit_code() as u8)
                }
                None => {
                    tracing::error!("❌ {:#}", e);
                    eprintln!("❌ {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn run(cli: &Cli, config: ServiceConfig) -> anyhow::Result<()> {
    let service = ForecastService::from_config(&config)
        .await
        .context("Failed to start forecast service")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            signal.cancel();
        }
    });

    match &cli.command {
        Command::Serve => {
            http::serve(Arc::new(service), config.bind_address, shutdown).await?;
        }
        Command::Forecast {
            latitude,
            longitude,
        } => {
            let coordinate = Coordinate::checked(*latitude, *longitude)?;
            let forecast = service
                .get_forecast_by_coordinate(coordinate, &shutdown)
                .await?;
            print_json(&forecast)?;
        }
        Command::Locations { action } => match action {
            LocationsCommand::List => {
                print_json(&service.list_locations(&shutdown).await?)?;
            }
            LocationsCommand::Add {
                latitude,
                longitude,
            } => {
                let coordinate = Coordinate::checked(*latitude, *longitude)?;
                print_json(&service.add_location(coordinate, &shutdown).await?)?;
            }
            LocationsCommand::Show { id } => {
                print_json(&service.get_location(*id, &shutdown).await?)?;
            }
            LocationsCommand::Delete { id } => {
                if !service.delete_location(*id, &shutdown).await? {
                    return Err(ForecastError::NotFound { id: *id }.into());
                }
                println!("✅ Deleted location {}", id);
            }
            LocationsCommand::Forecast { id } => {
                print_json(&service.get_forecast_by_location_id(*id, &shutdown).await?)?;
            }
        },
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
