//! Sink writer interface and the in-memory sink
//!
//! The in-memory sink also keeps the latest record per subject, which is
//! what a live price view reads.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use stockflow_core::{AggregateRecord, WriteResult};

/// Persists aggregate records. Called concurrently from batch workers.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    async fn write(&self, record: &AggregateRecord) -> WriteResult<()>;

    fn name(&self) -> &'static str;
}

/// Keeps every written record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    history: Mutex<Vec<AggregateRecord>>,
    latest: DashMap<String, AggregateRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in write order
    pub fn records(&self) -> Vec<AggregateRecord> {
        self.history.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent record per subject, sorted by subject
    pub fn latest(&self) -> Vec<AggregateRecord> {
        let mut latest: Vec<AggregateRecord> =
            self.latest.iter().map(|r| r.value().clone()).collect();
        latest.sort_by(|a, b| a.subject.cmp(&b.subject));
        latest
    }

    pub fn latest_for(&self, subject: &str) -> Option<AggregateRecord> {
        self.latest.get(subject).map(|r| r.value().clone())
    }
}

#[async_trait]
impl SinkWriter for MemorySink {
    async fn write(&self, record: &AggregateRecord) -> WriteResult<()> {
        // Both updates under the history lock so `latest` never runs ahead of `records`.
        let mut history = self.history.lock();
        self.latest.insert(record.subject.clone(), record.clone());
        history.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
