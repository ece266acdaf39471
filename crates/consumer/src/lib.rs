//! Process glue for the stockflow consumer
//!
//! Loads settings from the environment and provides the concrete sources
//! and sinks the binaries plug into the pipeline.

pub mod logging;
pub mod publisher;
pub mod settings;
pub mod sinks;
pub mod sources;

pub use publisher::SimulatedPublisher;
pub use settings::{PublisherSettings, Settings, SourceKind};
pub use sinks::{JsonlSink, LogSink};
pub use sources::LineSource;
