//! Environment-driven settings
//!
//! Variable names follow the original deployment (`QUEUE_NAME`,
//! `MESSAGE_GROUP_SIZE`, `TICKER_INTERVAL`). Anything missing or malformed
//! is a [`ConfigError`], reported before the pipeline starts.

use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use stockflow_core::{ConfigError, ConfigResult, PipelineConfig};

const DEFAULT_SUBJECTS: [&str; 3] = ["MSFT", "TSLA", "AAPL"];
const DEFAULT_TICKER_INTERVAL_MS: u64 = 1;

/// Where the consumer reads raw payloads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Newline-delimited JSON on stdin
    Stdin,
    /// In-process publisher for the configured subject
    Simulated,
    /// Newline-delimited JSON file
    File(PathBuf),
}

impl SourceKind {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("-") | Some("stdin") => SourceKind::Stdin,
            Some("simulated") => SourceKind::Simulated,
            Some(path) => SourceKind::File(PathBuf::from(path)),
        }
    }
}

// Every value arrives as a string; parsing happens below so errors can name
// the variable.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    queue_name: Option<String>,
    message_group_size: Option<String>,
    max_in_flight_batches: Option<String>,
    source: Option<String>,
    sink_path: Option<String>,
    ticker_interval: Option<String>,
    publish_limit: Option<String>,
    subjects: Option<String>,
}

impl RawSettings {
    fn load(env: Environment) -> ConfigResult<Self> {
        Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))
    }
}

/// Consumer process settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub source: SourceKind,
    /// JSON-lines output; records are only logged when unset
    pub sink_path: Option<PathBuf>,
    pub ticker_interval: Duration,
}

impl Settings {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_environment(Environment::default())
    }

    pub fn from_environment(env: Environment) -> ConfigResult<Self> {
        let raw = RawSettings::load(env)?;

        let subject = non_empty(raw.queue_name).ok_or(ConfigError::Missing("QUEUE_NAME"))?;
        let batch_size = non_empty(raw.message_group_size)
            .ok_or(ConfigError::Missing("MESSAGE_GROUP_SIZE"))?;
        let batch_size = batch_size
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or(ConfigError::InvalidBatchSize(batch_size))?;

        let mut pipeline = PipelineConfig::new(subject, batch_size);
        if let Some(max) = parse_positive("MAX_IN_FLIGHT_BATCHES", raw.max_in_flight_batches)? {
            pipeline = pipeline.with_max_in_flight(max);
        }
        pipeline.validate()?;

        Ok(Self {
            pipeline,
            source: SourceKind::parse(raw.source.as_deref()),
            sink_path: non_empty(raw.sink_path).map(PathBuf::from),
            ticker_interval: ticker_interval(raw.ticker_interval)?,
        })
    }
}

/// Settings for the `stock-publisher` binary
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub subjects: Vec<String>,
    pub ticker_interval: Duration,
    /// Events per subject before stopping; runs until interrupted when unset
    pub limit: Option<usize>,
}

impl PublisherSettings {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_environment(Environment::default())
    }

    pub fn from_environment(env: Environment) -> ConfigResult<Self> {
        let raw = RawSettings::load(env)?;

        let subjects: Vec<String> = match non_empty(raw.subjects) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
        };
        if subjects.is_empty() {
            return Err(ConfigError::Missing("SUBJECTS"));
        }

        Ok(Self {
            subjects,
            ticker_interval: ticker_interval(raw.ticker_interval)?,
            limit: parse_positive("PUBLISH_LIMIT", raw.publish_limit)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_positive(key: &'static str, value: Option<String>) -> ConfigResult<Option<usize>> {
    match non_empty(value) {
        None => Ok(None),
        Some(value) => match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidValue { key, value }),
        },
    }
}

fn ticker_interval(value: Option<String>) -> ConfigResult<Duration> {
    let millis = match non_empty(value) {
        None => DEFAULT_TICKER_INTERVAL_MS,
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue { key: "TICKER_INTERVAL", value })?,
    };
    Ok(Duration::from_millis(millis.max(1)))
}
