//! Stock publisher
//!
//! Writes random price events for each subject to stdout as JSON lines, so
//! it can be piped straight into the consumer.

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;

use stockflow_consumer::{logging, PublisherSettings, SimulatedPublisher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let settings = PublisherSettings::from_env()?;
    info!(
        "Publishing {} every {:?}; press Ctrl+C to exit",
        settings.subjects.join(", "),
        settings.ticker_interval
    );

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(10_000);
    let mut publisher = SimulatedPublisher::new(settings.subjects, settings.ticker_interval);
    if let Some(limit) = settings.limit {
        publisher = publisher.with_limit(limit);
    }
    publisher.spawn(tx);

    let mut stdout = BufWriter::new(tokio::io::stdout());
    let mut written = 0u64;

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C");
                break;
            }
            payload = rx.recv() => match payload {
                Some(payload) => {
                    stdout.write_all(&payload).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                    written += 1;
                }
                None => break,
            },
        }
    }

    stdout.flush().await?;
    info!("Published {} events", written);
    Ok(())
}
