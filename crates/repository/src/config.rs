//! Repository configuration.
//!
//! Every field has a serde default, so an empty JSON object deserializes
//! to `RepositoryConfig::default()`.

use quarry_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a bulk write evicts from the working set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationStrategy {
    /// Every cached entity of the written type.
    #[default]
    ClearType,
    /// Only the identities the bulk write reported.
    Targeted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub invalidation: InvalidationStrategy,

    /// How long a pessimistic read waits for row locks.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Used when a page request carries size 0.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Larger page requests are clamped to this size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Flush pending changes before running a query in the same unit of work.
    #[serde(default = "default_flush_before_query")]
    pub flush_before_query: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            invalidation: InvalidationStrategy::default(),
            lock_timeout_ms: default_lock_timeout_ms(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            flush_before_query: default_flush_before_query(),
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    3000
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    2000
}

fn default_flush_before_query() -> bool {
    true
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_page_size == 0 {
            return Err(Error::invalid_operation("default_page_size must be positive"));
        }
        if self.max_page_size < self.default_page_size {
            return Err(Error::invalid_operation(format!(
                "max_page_size {} is below default_page_size {}",
                self.max_page_size, self.default_page_size
            )));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::invalid_operation("lock_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Effective size for a requested page size.
    pub fn page_size(&self, requested: usize) -> usize {
        match requested {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config: RepositoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RepositoryConfig::default());
        assert_eq!(config.invalidation, InvalidationStrategy::ClearType);
        assert_eq!(config.lock_timeout(), Duration::from_millis(3000));
        assert!(config.flush_before_query);
    }

    #[test]
    fn test_partial_override() {
        let config: RepositoryConfig =
            serde_json::from_str(r#"{"invalidation":"targeted","max_page_size":50}"#).unwrap();
        assert_eq!(config.invalidation, InvalidationStrategy::Targeted);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.default_page_size, 20);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = serde_json::from_str::<RepositoryConfig>(r#"{"invalidation":"never"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_page_size() {
        let config = RepositoryConfig {
            max_page_size: 100,
            ..RepositoryConfig::default()
        };
        assert_eq!(config.page_size(0), 20);
        assert_eq!(config.page_size(7), 7);
        assert_eq!(config.page_size(5000), 100);
    }

    #[test]
    fn test_validate() {
        assert!(RepositoryConfig::default().validate().is_ok());
        let bad = RepositoryConfig {
            default_page_size: 50,
            max_page_size: 10,
            ..RepositoryConfig::default()
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidOperation { .. })));
    }
}
