//! Batching price aggregation pipeline
//!
//! Features:
//! - Fixed-size batch accumulation with atomic hand-off
//! - Concurrent per-batch workers with a deterministic join point
//! - Optional bound on concurrently running workers
//! - Drain-on-shutdown so a trailing partial batch is never lost
//! - Pluggable source and sink collaborators

pub mod accumulator;
pub mod aggregate;
pub mod pipeline;
pub mod pool;
pub mod sink;
pub mod source;

pub use accumulator::BatchAccumulator;
pub use aggregate::mean_price;
pub use pipeline::{Pipeline, PipelineReport, PipelineState};
pub use pool::{PoolStats, WorkerPool};
pub use sink::{MemorySink, SinkWriter};
pub use source::{ChannelSource, SourceReader, StreamSource};
