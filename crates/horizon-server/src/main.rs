//! Horizon server - main entry point

use anyhow::Result;
use horizon_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use horizon_server::{
    api::{self, AppState},
    bus,
    config::Config,
    db,
    ingest::{IngestionConsumer, IngestionPipeline, PipelineStores},
    storage,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .log_file_prefix("horizon-server".to_string())
        .filter_directives("horizon_server=debug,tower_http=debug,sqlx=warn".to_string())
        .build()
        // LOG_* variables take precedence over the defaults above
        .merge_env()?;

    // Kept alive so the file appender flushes on exit
    let _log_guard = init_logging(&log_config)?;

    info!("Starting Horizon server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}",
        config.bind_address()
    );

    let pool = db::create_pool(&db::DbConfig::from(&config.database)).await?;
    db::run_migrations(&pool).await?;

    let staging = storage::init(config.storage.clone()).await?;
    info!(backend = ?config.storage.backend, "Staging store initialized");

    let bus = bus::connect(&config.bus)?;
    info!(transport = ?config.bus.transport, subject = %bus.subject(), "Message bus connected");

    let pipeline = Arc::new(IngestionPipeline::new(
        PipelineStores::postgres(pool.clone(), staging),
        config.ingest.missing_mapping_policy,
    ));

    if config.ingest.replay_on_start {
        match pipeline
            .replay_pending(config.ingest.replay_batch_size)
            .await
        {
            Ok(summary) => info!(
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Startup replay finished"
            ),
            // Pending references stay in the ledger for the next replay
            Err(e) => tracing::error!(error = %e, "Startup replay failed, continuing"),
        }
    }

    let shutdown = CancellationToken::new();
    let consumer_handle = if config.ingest.enabled {
        let consumer = IngestionConsumer::new(
            Arc::clone(&pipeline),
            Arc::clone(&bus),
            config.ingest.max_in_flight,
        );
        Some(tokio::spawn(consumer.run(shutdown.clone())))
    } else {
        info!("Ingestion is disabled (INGEST_ENABLED=false)");
        None
    };

    let state = AppState { db: pool, bus };
    let app = api::create_router(state, &config);

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(
            shutdown.clone(),
            config.server.shutdown_timeout_secs,
        ))
        .await?;

    shutdown.cancel();
    if let Some(handle) = consumer_handle {
        match handle.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => tracing::error!("Ingestion consumer failed: {}", e),
            Err(e) => tracing::error!("Ingestion consumer task panicked: {}", e),
        }
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(shutdown: CancellationToken, timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    begin_shutdown(&shutdown, timeout_secs).await;
}

/// Stops the consumer, then gives in-flight HTTP requests time to finish
async fn begin_shutdown(shutdown: &CancellationToken, timeout_secs: u64) {
    // No new deliveries are taken while connections drain
    shutdown.cancel();

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
