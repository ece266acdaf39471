//! Batch worker pool
//!
//! Every submitted batch runs on its own tokio task. Handles are kept so
//! shutdown has a join point; a worker that fails or panics only loses its
//! own aggregate.

use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use stockflow_core::{AggregateRecord, Batch};

use crate::aggregate::mean_price;
use crate::sink::SinkWriter;

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
}

/// Processes handed-off batches concurrently
pub struct WorkerPool {
    subject: Arc<str>,
    sink: Arc<dyn SinkWriter>,
    limiter: Option<Arc<Semaphore>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    // Workers spawned but not yet finished. Waiters watch this rather than
    // the handle list, which only one caller can take at a time.
    outstanding: Arc<watch::Sender<usize>>,
}

impl WorkerPool {
    pub fn new(
        subject: impl Into<Arc<str>>,
        sink: Arc<dyn SinkWriter>,
        max_in_flight: Option<usize>,
    ) -> Self {
        Self {
            subject: subject.into(),
            sink,
            limiter: max_in_flight.map(|max| Arc::new(Semaphore::new(max))),
            handles: Mutex::new(vec![]),
            counters: Arc::new(Counters::default()),
            outstanding: Arc::new(watch::channel(0).0),
        }
    }

    /// Spawn a worker for `batch`. Never waits, even when the pool is bounded.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, batch: Batch) {
        let subject = Arc::clone(&self.subject);
        let sink = Arc::clone(&self.sink);
        let limiter = self.limiter.clone();
        let counters = Arc::clone(&self.counters);
        let outstanding = Arc::clone(&self.outstanding);

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.outstanding.send_modify(|n| *n += 1);

        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so acquire only fails if that changes.
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None,
            };

            let sequence = batch.sequence();
            let outcome = AssertUnwindSafe(process_batch(&subject, sink.as_ref(), batch))
                .catch_unwind()
                .await;

            match outcome {
                Ok(true) => counters.written.fetch_add(1, Ordering::Relaxed),
                Ok(false) => counters.failed.fetch_add(1, Ordering::Relaxed),
                Err(_) => {
                    error!("Worker for {} batch #{} panicked", subject, sequence);
                    counters.failed.fetch_add(1, Ordering::Relaxed)
                }
            };
            outstanding.send_modify(|n| *n -= 1);
        });

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Wait for every submitted worker, including ones submitted while waiting.
    ///
    /// Safe to call from several tasks at once: each caller returns only once
    /// no worker is outstanding. Returns how many handles this caller joined.
    pub async fn await_all(&self) -> usize {
        let mut idle = self.outstanding.subscribe();
        let mut joined = 0;

        loop {
            let pending = std::mem::take(&mut *self.handles.lock());
            if pending.is_empty() {
                break;
            }

            for handle in pending {
                if let Err(e) = handle.await {
                    error!("Worker for {} did not complete: {}", self.subject, e);
                }
                joined += 1;
            }
        }

        // Handles taken by a concurrent caller may still be running.
        if idle.wait_for(|n| *n == 0).await.is_err() {
            error!("Worker tracking for {} closed while waiting", self.subject);
        }
        joined
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Workers spawned and not yet finished
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    pub fn stats(&self) -> PoolStats {
        let submitted = self.counters.submitted.load(Ordering::Relaxed);
        let written = self.counters.written.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);

        PoolStats {
            submitted,
            written,
            failed,
            in_flight: submitted.saturating_sub(written + failed),
        }
    }
}

async fn process_batch(subject: &str, sink: &dyn SinkWriter, batch: Batch) -> bool {
    let average = mean_price(&batch);
    let record = AggregateRecord::new(subject, average, batch.len());

    match sink.write(&record).await {
        Ok(()) => {
            debug!(
                "Wrote average {:.4} for {} batch #{} ({} events) to {}",
                average,
                subject,
                batch.sequence(),
                batch.len(),
                sink.name()
            );
            true
        }
        Err(e) => {
            error!(
                "Failed to write average for {} batch #{} to {}: {}",
                subject,
                batch.sequence(),
                sink.name(),
                e
            );
            false
        }
    }
}

/// Worker pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub submitted: u64,
    pub written: u64,
    pub failed: u64,
    pub in_flight: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use stockflow_core::{Event, EventKind, WriteError, WriteResult};

    use crate::sink::MemorySink;

    fn batch(sequence: u64, prices: &[f64]) -> Batch {
        let events = prices
            .iter()
            .map(|p| Event::new("MSFT", EventKind::Buy, *p))
            .collect();
        Batch::new(sequence, events).unwrap()
    }

    /// Sleeps before writing and records peak concurrency
    #[derive(Default)]
    struct SlowSink {
        inner: MemorySink,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SinkWriter for SlowSink {
        async fn write(&self, record: &AggregateRecord) -> WriteResult<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.inner.write(record).await
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    /// Rejects records above a threshold, panics on negative averages
    struct PickySink {
        inner: MemorySink,
        reject_above: f64,
    }

    #[async_trait]
    impl SinkWriter for PickySink {
        async fn write(&self, record: &AggregateRecord) -> WriteResult<()> {
            if record.average_price < 0.0 {
                panic!("negative average");
            }
            if record.average_price > self.reject_above {
                return Err(WriteError::Rejected("too expensive".to_string()));
            }
            self.inner.write(record).await
        }

        fn name(&self) -> &'static str {
            "picky"
        }
    }

    #[tokio::test]
    async fn test_await_all_waits_for_delayed_writes() {
        let sink = Arc::new(SlowSink::default());
        let pool = WorkerPool::new("MSFT", sink.clone(), None);

        for i in 0..5 {
            pool.submit(batch(i, &[i as f64]));
        }

        // Current-thread runtime: nothing has run yet.
        assert_eq!(sink.inner.len(), 0);
        assert_eq!(pool.stats().in_flight, 5);

        let joined = pool.await_all().await;
        assert_eq!(joined, 5);
        assert_eq!(sink.inner.len(), 5);
        assert_eq!(
            pool.stats(),
            PoolStats { submitted: 5, written: 5, failed: 0, in_flight: 0 }
        );
        assert_eq!(pool.await_all().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_await_all_both_wait() {
        let sink = Arc::new(SlowSink::default());
        let pool = Arc::new(WorkerPool::new("MSFT", sink.clone(), None));

        for i in 0..3 {
            pool.submit(batch(i, &[i as f64]));
        }

        let first = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.await_all().await })
        };
        // Let the first waiter take the handles.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let joined_second = pool.await_all().await;
        assert_eq!(sink.inner.len(), 3, "second waiter returned before writes landed");
        assert_eq!(pool.outstanding(), 0);

        let joined_first = first.await.unwrap();
        assert_eq!(joined_first + joined_second, 3);
        assert_eq!(sink.inner.len(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let sink = Arc::new(PickySink {
            inner: MemorySink::new(),
            reject_above: 300.0,
        });
        let pool = WorkerPool::new("MSFT", sink.clone(), None);

        pool.submit(batch(0, &[100.0, 200.0]));
        pool.submit(batch(1, &[500.0]));
        pool.submit(batch(2, &[-1.0]));
        pool.submit(batch(3, &[250.0]));
        pool.await_all().await;

        let mut written: Vec<f64> = sink.inner.records().iter().map(|r| r.average_price).collect();
        written.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(written, vec![150.0, 250.0]);

        let stats = pool.stats();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_concurrency() {
        let sink = Arc::new(SlowSink::default());
        let pool = WorkerPool::new("MSFT", sink.clone(), Some(2));

        for i in 0..8 {
            pool.submit(batch(i, &[1.0]));
        }
        pool.await_all().await;

        assert_eq!(sink.inner.len(), 8);
        assert!(sink.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unbounded_runs_concurrently() {
        let sink = Arc::new(SlowSink::default());
        let pool = WorkerPool::new("MSFT", sink.clone(), None);

        for i in 0..8 {
            pool.submit(batch(i, &[1.0]));
        }
        pool.await_all().await;

        assert_eq!(sink.inner.len(), 8);
        assert!(sink.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_record_carries_subject_and_size() {
        let sink = Arc::new(MemorySink::new());
        let pool = WorkerPool::new("TSLA", sink.clone(), None);

        pool.submit(batch(0, &[10.0, 20.0, 30.0]));
        pool.await_all().await;

        let record = sink.latest_for("TSLA").unwrap();
        assert_eq!(record.average_price, 20.0);
        assert_eq!(record.batch_size, 3);
        assert_eq!(pool.subject(), "TSLA");
    }
}
