//! Dispatcher configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Worker pool size, capacity, admission and retention knobs.
///
/// Every field has a default, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of workers pulling admitted tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound on the summed weight of running tasks.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// How long a synchronous caller lets its task wait for admission before
    /// cancelling it. `None` waits forever.
    #[serde(default)]
    pub admission_timeout_ms: Option<u64>,

    #[serde(default)]
    pub archive: ArchivePolicy,

    #[serde(default)]
    pub weights: TaskWeights,
}

/// Retention of completed durable records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivePolicy {
    /// Oldest-completed records are evicted past this count.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Records completed longer ago than this are purged.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,

    /// Period of the background purge.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

/// Weights assigned by the request builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWeights {
    #[serde(default = "default_weight")]
    pub create: u32,

    #[serde(default = "default_weight", rename = "default")]
    pub default_weight: u32,
}

fn default_workers() -> usize {
    4
}

fn default_capacity() -> u32 {
    10
}

fn default_max_records() -> usize {
    1000
}

fn default_max_age_ms() -> u64 {
    60 * 60 * 1000
}

fn default_sweep_interval_ms() -> u64 {
    60 * 1000
}

fn default_weight() -> u32 {
    1
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            capacity: default_capacity(),
            admission_timeout_ms: None,
            archive: ArchivePolicy::default(),
            weights: TaskWeights::default(),
        }
    }
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            max_age_ms: default_max_age_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Default for TaskWeights {
    fn default() -> Self {
        Self {
            create: default_weight(),
            default_weight: default_weight(),
        }
    }
}

impl ArchivePolicy {
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl DispatcherConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ValidationError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn admission_timeout(&self) -> Option<Duration> {
        self.admission_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.capacity == 0 {
            return Err(ValidationError::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.archive.max_records == 0 {
            return Err(ValidationError::InvalidConfig(
                "archive.max_records must be at least 1".into(),
            ));
        }
        if self.archive.sweep_interval_ms == 0 {
            return Err(ValidationError::InvalidConfig(
                "archive.sweep_interval_ms must be positive".into(),
            ));
        }
        for (name, weight) in [
            ("weights.create", self.weights.create),
            ("weights.default", self.weights.default_weight),
        ] {
            if weight > self.capacity {
                return Err(ValidationError::InvalidConfig(format!(
                    "{name} ({weight}) exceeds capacity ({})",
                    self.capacity
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DispatcherConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DispatcherConfig::default());
        assert_eq!(config.workers, 4);
        assert_eq!(config.capacity, 10);
        assert_eq!(config.archive.max_records, 1000);
        assert_eq!(config.archive.max_age(), Duration::from_secs(3600));
        assert!(config.admission_timeout().is_none());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = DispatcherConfig::from_json_str(
            r#"{
                "workers": 2,
                "admission_timeout_ms": 250,
                "archive": { "max_records": 5 },
                "weights": { "create": 3, "default": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.admission_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.archive.max_records, 5);
        assert_eq!(config.archive.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.weights.create, 3);
        assert_eq!(config.weights.default_weight, 2);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = DispatcherConfig::from_json_str(r#"{"capacity": 0}"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig(_)));
    }

    #[test]
    fn empty_archive_is_rejected() {
        let err = DispatcherConfig::from_json_str(r#"{"archive": {"max_records": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig(_)));

        let config = DispatcherConfig {
            archive: ArchivePolicy {
                max_records: 0,
                ..ArchivePolicy::default()
            },
            ..DispatcherConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(crate::dispatch::Dispatcher::new(config).is_err());
    }

    #[test]
    fn weight_over_capacity_is_rejected() {
        let err = DispatcherConfig::from_json_str(r#"{"capacity": 2, "weights": {"create": 3}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("weights.create"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            DispatcherConfig::from_json_str("{workers: }"),
            Err(ValidationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = DispatcherConfig::from_path("/nonexistent/sluice.json").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
