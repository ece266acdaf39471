//! Pipeline lifecycle - coordinates decoding, batching and workers

use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use stockflow_core::{decode, ConfigResult, PipelineConfig};

use crate::accumulator::BatchAccumulator;
use crate::pool::WorkerPool;
use crate::sink::SinkWriter;
use crate::source::SourceReader;

/// Lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Draining,
    Stopped,
}

/// Longest payload prefix echoed into decode-failure logs
const LOGGED_PAYLOAD_BYTES: usize = 256;

/// Batching consumer for one channel
pub struct Pipeline {
    config: PipelineConfig,
    accumulator: BatchAccumulator,
    pool: WorkerPool,
    state: RwLock<PipelineState>,
    // Flips to true once the drain finished; late `shutdown` callers wait on it.
    stopped: watch::Sender<bool>,
    received: AtomicU64,
    decode_failures: AtomicU64,
}

impl Pipeline {
    /// Validates `config`; an invalid configuration never produces a pipeline.
    pub fn new(config: PipelineConfig, sink: Arc<dyn SinkWriter>) -> ConfigResult<Self> {
        config.validate()?;
        let batch_size = config.batch_size()?;

        info!(
            "Pipeline for {} created: batch size {}, sink {}, max in flight {}",
            config.subject,
            batch_size,
            sink.name(),
            config
                .max_in_flight
                .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
        );

        Ok(Self {
            accumulator: BatchAccumulator::new(batch_size),
            pool: WorkerPool::new(config.subject.as_str(), sink, config.max_in_flight),
            config,
            state: RwLock::new(PipelineState::Running),
            stopped: watch::channel(false).0,
            received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    /// Decode one payload and feed it to the accumulator.
    ///
    /// Returns `false` when the payload was discarded, either because it did
    /// not decode or because the pipeline no longer accepts input. Safe to
    /// call from many tasks at once.
    pub fn ingest(&self, payload: &[u8]) -> bool {
        self.received.fetch_add(1, Ordering::Relaxed);

        let event = match decode(payload) {
            Ok(event) => event,
            Err(e) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Discarding message on {}: {} ({} bytes, payload: {})",
                    self.config.subject,
                    e,
                    payload.len(),
                    payload_preview(payload)
                );
                return false;
            }
        };

        // Held across offer + submit so draining cannot slip in between.
        let state = self.state.read();
        if *state != PipelineState::Running {
            warn!(
                "Pipeline for {} is {:?}, dropping {} event",
                self.config.subject, *state, event.subject
            );
            return false;
        }

        if let Some(batch) = self.accumulator.offer(event) {
            debug!(
                "Dispatching {} batch #{} ({} events)",
                self.config.subject,
                batch.sequence(),
                batch.len()
            );
            self.pool.submit(batch);
        }

        true
    }

    /// Pull payloads from `source` until it ends, fails, or `shutdown`
    /// resolves, then drain and stop.
    pub async fn run<S, F>(&self, mut source: S, shutdown: F) -> PipelineReport
    where
        S: SourceReader,
        F: Future<Output = ()>,
    {
        let source_name = source.name().to_string();
        info!("Starting pipeline for {} from {}", self.config.subject, source_name);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received for {}", self.config.subject);
                    break;
                }
                next = source.next_payload() => match next {
                    Ok(Some(payload)) => {
                        self.ingest(&payload);
                    }
                    Ok(None) => {
                        info!("Source {} exhausted", source_name);
                        break;
                    }
                    Err(e) => {
                        error!("Source {} failed: {}", source_name, e);
                        break;
                    }
                },
            }
        }

        self.shutdown().await
    }

    /// Stop intake, flush the partial batch and wait for every worker.
    ///
    /// Every caller, including concurrent ones, returns only after the drain
    /// completed and the pipeline reached [`PipelineState::Stopped`].
    pub async fn shutdown(&self) -> PipelineReport {
        let already_draining = {
            let mut state = self.state.write();
            let running = *state == PipelineState::Running;
            if running {
                *state = PipelineState::Draining;
            }
            !running
        };
        if already_draining {
            // Another caller owns the drain.
            let mut stopped = self.stopped.subscribe();
            if stopped.wait_for(|done| *done).await.is_err() {
                error!("Stop signal for {} closed while waiting", self.config.subject);
            }
            return self.report();
        }
        info!("Draining pipeline for {}", self.config.subject);

        if let Some(batch) = self.accumulator.drain() {
            info!(
                "Flushing partial {} batch #{} ({} events)",
                self.config.subject,
                batch.sequence(),
                batch.len()
            );
            self.pool.submit(batch);
        }

        let joined = self.pool.await_all().await;
        *self.state.write() = PipelineState::Stopped;
        self.stopped.send_replace(true);

        let report = self.report();
        info!(
            "Pipeline for {} stopped after joining {} workers: {}",
            self.config.subject, joined, report
        );
        report
    }

    pub fn report(&self) -> PipelineReport {
        let pool = self.pool.stats();

        PipelineReport {
            received: self.received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            batches_dispatched: pool.submitted,
            records_written: pool.written,
            write_failures: pool.failed,
            pending_events: self.accumulator.pending(),
        }
    }
}

fn payload_preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(LOGGED_PAYLOAD_BYTES)];
    let mut preview = String::from_utf8_lossy(shown).into_owned();
    if shown.len() < payload.len() {
        preview.push_str("...");
    }
    preview
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineReport {
    pub received: u64,
    pub decode_failures: u64,
    pub batches_dispatched: u64,
    pub records_written: u64,
    pub write_failures: u64,
    pub pending_events: usize,
}

impl std::fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} received, {} undecodable, {} batches, {} written, {} failed",
            self.received,
            self.decode_failures,
            self.batches_dispatched,
            self.records_written,
            self.write_failures
        )
    }
}
