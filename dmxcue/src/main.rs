use dmxcue::config::AppConfig;
use dmxcue::database;
use dmxcue::logging::init_logging;
use dmxcue::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    // Keep the guard alive so buffered log lines are flushed on exit.
    let (logging_config, _guard) = init_logging(&config.log_dir)?;

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let container = ServiceContainer::new(pool, &config).with_logging_config(logging_config);
    container.initialize();

    let server = container.api_server(config.api.clone());
    let server_task = tokio::spawn(async move { server.run().await });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    container.shutdown().await?;
    match server_task.await {
        Ok(Err(e)) => tracing::error!(error = %e, "API server error"),
        Err(e) => tracing::error!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    tracing::info!("dmxcue stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
