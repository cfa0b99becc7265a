mod config;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use punchbridge_api::AppStateInner;
use punchbridge_db::Database;
use punchbridge_ingest::{
    ConnectionState, IngestPipeline, SqliteStore, StatusTracker, run_ingest_worker,
    run_mqtt_subscriber,
};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "punchbridge=debug,punchbridge_ingest=debug,punchbridge_api=info,tower_http=info".into()
            }),
        )
        .init();

    // Config
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("       Set it in your environment or .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let status = StatusTracker::new();
    let connection = ConnectionState::default();
    let shutdown = CancellationToken::new();

    let store = Arc::new(SqliteStore::new(db));
    let pipeline = Arc::new(IngestPipeline::new(store, status.clone(), config.store_images));

    // Transport → bounded queue → single ingest worker
    let (queue_tx, queue_rx) = mpsc::channel(config.ingest_queue_capacity);
    let worker = tokio::spawn(run_ingest_worker(pipeline, queue_rx, shutdown.clone()));
    let subscriber = tokio::spawn(run_mqtt_subscriber(
        config.mqtt_settings(),
        queue_tx,
        connection.clone(),
        shutdown.clone(),
    ));

    let app_state = Arc::new(AppStateInner {
        status,
        mqtt: connection,
        mqtt_url: config.broker.redacted(),
        mqtt_topic: config.mqtt_topic.clone(),
        admin_token: config.admin_token.clone(),
    });
    let app = punchbridge_api::router(app_state);

    info!(
        "MQTT→store bridge listening on {} (images {})",
        config.bind_addr,
        if config.store_images { "stored" } else { "discarded" }
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let http_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            http_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = subscriber.await {
        warn!(error = %e, "MQTT subscriber task failed");
    }
    if let Err(e) = worker.await {
        warn!(error = %e, "ingest worker task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
