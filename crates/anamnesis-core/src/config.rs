//! Service configuration.
//!
//! ## Example
//!
//! ```
//! use anamnesis_core::ServiceConfig;
//!
//! let config = ServiceConfig::builder()
//!     .process_name("ffxiv_dx11")
//!     .tick_interval_ms(33)
//!     .build();
//! assert_eq!(config.retry_attempts, 10);
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retry::{FixedDelay, RetryStrategy};

/// Configuration for the marshaler service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Fragment of the game's process name to attach to
    pub process_name: String,
    /// Period of the tick thread
    pub tick_interval_ms: u64,
    /// Period of the liveness check
    pub liveness_interval_ms: u64,
    /// Attempts per tick before a marshaler is disposed
    pub retry_attempts: u32,
    /// Delay between attempts
    pub retry_delay_ms: u64,
    /// Width of string fields
    pub string_length: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            process_name: "ffxiv_dx11".to_string(),
            tick_interval_ms: 16,
            liveness_interval_ms: 100,
            retry_attempts: 10,
            retry_delay_ms: 10,
            string_length: 32,
        }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Load from a TOML file. Keys that are absent take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn retry_strategy(&self) -> Arc<dyn RetryStrategy> {
        Arc::new(FixedDelay::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        ))
    }
}

/// Builder for ServiceConfig
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    process_name: Option<String>,
    tick_interval_ms: Option<u64>,
    liveness_interval_ms: Option<u64>,
    retry_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    string_length: Option<usize>,
}

impl ServiceConfigBuilder {
    pub fn process_name<S: Into<String>>(mut self, name: S) -> Self {
        self.process_name = Some(name.into());
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = Some(ms);
        self
    }

    pub fn liveness_interval_ms(mut self, ms: u64) -> Self {
        self.liveness_interval_ms = Some(ms);
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = Some(ms);
        self
    }

    pub fn string_length(mut self, length: usize) -> Self {
        self.string_length = Some(length);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServiceConfig {
        let default = ServiceConfig::default();
        ServiceConfig {
            process_name: self.process_name.unwrap_or(default.process_name),
            tick_interval_ms: self.tick_interval_ms.unwrap_or(default.tick_interval_ms),
            liveness_interval_ms: self
                .liveness_interval_ms
                .unwrap_or(default.liveness_interval_ms),
            retry_attempts: self.retry_attempts.unwrap_or(default.retry_attempts),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(default.retry_delay_ms),
            string_length: self.string_length.unwrap_or(default.string_length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::tempdir;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = ServiceConfig::builder()
            .tick_interval_ms(5)
            .retry_attempts(3)
            .build();

        assert_eq!(config.tick_interval(), Duration::from_millis(5));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.process_name, "ffxiv_dx11");
        assert_eq!(config.liveness_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anamnesis.toml");
        fs::write(&path, "process_name = \"ffxiv\"\nstring_length = 64\n").unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.process_name, "ffxiv");
        assert_eq!(config.string_length, 64);
        assert_eq!(config.tick_interval_ms, 16);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = ServiceConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anamnesis.toml");
        fs::write(&path, "tick_interval_ms = \"fast\"").unwrap();

        assert!(matches!(ServiceConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_retry_strategy_from_config() {
        let config = ServiceConfig::default();
        let strategy = config.retry_strategy();
        assert_eq!(strategy.max_attempts(), Some(10));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(10)));
    }
}
