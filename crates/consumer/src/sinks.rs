//! Concrete sink writers

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use stockflow_core::{AggregateRecord, WriteResult};
use stockflow_pipeline::SinkWriter;

/// Logs each record instead of persisting it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl SinkWriter for LogSink {
    async fn write(&self, record: &AggregateRecord) -> WriteResult<()> {
        info!(
            "Average price for {}: {:.4} over {} events at {}",
            record.subject, record.average_price, record.batch_size, record.computed_at
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Appends one JSON object per record to a file.
///
/// Each record is flushed before `write` returns. A failed write is rolled
/// back so the next record never lands on a half-written line.
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<Appender>,
}

struct Appender {
    file: File,
    // Set when a failed write could not be rolled back; the next record then
    // starts on a fresh line.
    torn: bool,
}

impl JsonlSink {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!("Writing aggregates to {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(Appender { file, torn: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SinkWriter for JsonlSink {
    async fn write(&self, record: &AggregateRecord) -> WriteResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        if writer.torn {
            line.insert(0, b'\n');
        }

        let start = writer.file.metadata().await?.len();
        let result: std::io::Result<()> = async {
            writer.file.write_all(&line).await?;
            writer.file.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                writer.torn = false;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = writer.file.set_len(start).await {
                    warn!(
                        "Could not roll back partial record in {}: {}",
                        self.path.display(),
                        rollback
                    );
                    writer.torn = true;
                }
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
