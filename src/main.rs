use std::{process, sync::Arc};

use orso::{
    application::{context::AppContext, error::AppError},
    config,
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));
    repositories
        .health_check()
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    let context = AppContext::initialize(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories,
        settings.processor.tick,
    )
    .await?;

    info!(
        tick_ms = settings.processor.tick.as_millis() as u64,
        "orso ready; queue processor running"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| AppError::unexpected(format!("failed to listen for shutdown: {err}")))?;
    info!("shutdown signal received");

    context.shutdown().await;
    Ok(())
}
