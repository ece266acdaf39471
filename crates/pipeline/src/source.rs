//! Source reader interface and stream-backed sources

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use stockflow_core::SourceResult;

/// Supplies raw message payloads.
///
/// `Ok(None)` means the source is exhausted. Implementations must be
/// cancel-safe: the pipeline drops a pending `next_payload` future when a
/// shutdown signal wins the race, and no payload may be lost by that.
#[async_trait]
pub trait SourceReader: Send {
    async fn next_payload(&mut self) -> SourceResult<Option<Vec<u8>>>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<S: SourceReader + ?Sized> SourceReader for Box<S> {
    async fn next_payload(&mut self) -> SourceResult<Option<Vec<u8>>> {
        (**self).next_payload().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapts any payload stream into a [`SourceReader`]
pub struct StreamSource<S> {
    name: String,
    inner: S,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = Vec<u8>> + Unpin + Send,
{
    pub fn new(name: impl Into<String>, inner: S) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

#[async_trait]
impl<S> SourceReader for StreamSource<S>
where
    S: Stream<Item = Vec<u8>> + Unpin + Send,
{
    async fn next_payload(&mut self) -> SourceResult<Option<Vec<u8>>> {
        Ok(self.inner.next().await)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// In-process source fed through a tokio channel
pub type ChannelSource = StreamSource<ReceiverStream<Vec<u8>>>;

impl ChannelSource {
    /// Create a bounded channel; the source ends once every sender is dropped.
    pub fn channel(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(name, ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelSource::channel("test", 4);
        tx.send(b"one".to_vec()).await.unwrap();
        tx.send(b"two".to_vec()).await.unwrap();
        drop(tx);

        assert_eq!(source.name(), "test");
        assert_eq!(source.next_payload().await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_boxed_source() {
        let stream = futures::stream::iter(vec![b"x".to_vec()]);
        let mut source: Box<dyn SourceReader> = Box::new(StreamSource::new("iter", stream));

        assert_eq!(source.next_payload().await.unwrap(), Some(b"x".to_vec()));
        assert_eq!(source.next_payload().await.unwrap(), None);
    }
}
