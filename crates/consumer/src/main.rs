//! Stockflow consumer
//!
//! Reads price events for one channel, averages them per batch and records
//! each average. Ctrl+C or SIGTERM drains the partial batch before exiting.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use stockflow_consumer::{logging, sources, JsonlSink, LogSink, Settings};
use stockflow_pipeline::{Pipeline, SinkWriter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    logging::init();

    info!("Starting stockflow consumer v{}", env!("CARGO_PKG_VERSION"));

    // Configuration errors are fatal before anything starts
    let settings = Settings::from_env()?;

    let sink: Arc<dyn SinkWriter> = match &settings.sink_path {
        Some(path) => Arc::new(JsonlSink::open(path).await?),
        None => Arc::new(LogSink),
    };

    let pipeline = Pipeline::new(settings.pipeline.clone(), sink)?;
    let source = sources::open(&settings).await?;

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    info!("Consuming {}; press Ctrl+C to drain and exit", settings.pipeline.subject);

    let report = pipeline
        .run(source, async {
            shutdown_rx.await.ok();
        })
        .await;

    info!("Consumer shutdown complete: {}", report);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}
