//! Concrete source readers

use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use stockflow_core::SourceResult;
use stockflow_pipeline::{ChannelSource, SourceReader};

use crate::publisher::SimulatedPublisher;
use crate::settings::{Settings, SourceKind};

/// Newline-delimited payloads; blank lines are skipped
pub struct LineSource<R> {
    name: String,
    lines: Lines<R>,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            lines: reader.lines(),
        }
    }
}

impl LineSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(tokio::io::stdin()))
    }
}

impl LineSource<BufReader<File>> {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        Ok(Self::new(path.display().to_string(), BufReader::new(file)))
    }
}

#[async_trait]
impl<R> SourceReader for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_payload(&mut self) -> SourceResult<Option<Vec<u8>>> {
        while let Some(line) = self.lines.next_line().await? {
            if !line.trim().is_empty() {
                return Ok(Some(line.into_bytes()));
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build the source selected by `settings`
pub async fn open(settings: &Settings) -> anyhow::Result<Box<dyn SourceReader>> {
    let source: Box<dyn SourceReader> = match &settings.source {
        SourceKind::Stdin => Box::new(LineSource::stdin()),
        SourceKind::File(path) => Box::new(LineSource::open(path).await?),
        SourceKind::Simulated => {
            let (tx, source) = ChannelSource::channel("simulated", 10_000);
            let publisher = SimulatedPublisher::new(
                vec![settings.pipeline.subject.clone()],
                settings.ticker_interval,
            );
            // Publisher tasks stop on their own once the source is dropped.
            publisher.spawn(tx);
            Box::new(source)
        }
    };

    info!("Reading {} payloads from {}", settings.pipeline.subject, source.name());
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_source_skips_blank_lines() {
        let input: &[u8] = b"{\"a\":1}\n\n   \nbad\n{\"b\":2}";
        let mut source = LineSource::new("bytes", input);

        assert_eq!(source.next_payload().await.unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), Some(b"bad".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), Some(b"{\"b\":2}".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        tokio::fs::write(&path, "one\ntwo\n").await.unwrap();

        let mut source = LineSource::open(&path).await.unwrap();
        assert_eq!(source.next_payload().await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), None);
    }
}
