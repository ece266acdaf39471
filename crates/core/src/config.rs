//! Configuration types

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use crate::{ConfigError, ConfigResult};

/// Batch size used by the original consumer deployment
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Settings the batching pipeline needs from its surrounding process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Channel identifier stamped on every aggregate record
    pub subject: String,
    pub batch_size: usize,
    /// Upper bound on concurrently running batch workers; `None` is unbounded
    pub max_in_flight: Option<usize>,
}

impl PipelineConfig {
    pub fn new(subject: impl Into<String>, batch_size: usize) -> Self {
        Self {
            subject: subject.into(),
            batch_size,
            max_in_flight: None,
        }
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max);
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.subject.trim().is_empty() {
            return Err(ConfigError::Missing("subject"));
        }
        self.batch_size()?;
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "max_in_flight",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn batch_size(&self) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.batch_size)
            .ok_or_else(|| ConfigError::InvalidBatchSize(self.batch_size.to_string()))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            subject: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::new("MSFT", 3).validate().is_ok());

        let err = PipelineConfig::new("MSFT", 0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchSize(_)));

        let err = PipelineConfig::new("", 3).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("subject")));

        let err = PipelineConfig::new("MSFT", 3)
            .with_max_in_flight(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "max_in_flight", .. }));
    }
}
