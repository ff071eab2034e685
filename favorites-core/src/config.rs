//! Configuration types

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of ids fetched from the cache per batch while streaming.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Orchestration service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Number of ids resolved per cache batch fetch in `find_all`.
    /// Bounds how many assets are held in memory at once.
    pub batch_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Create ServiceConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `FAVORITES_CACHE_BATCH_SIZE`: ids per cache batch fetch (default: 100)
    pub fn from_env() -> Self {
        let batch_size = std::env::var("FAVORITES_CACHE_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BATCH_SIZE);
        Self { batch_size }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: self.batch_size.to_string(),
                reason: "batch_size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_batch_size() {
        let config = ServiceConfig::default();
        assert_eq!(config.batch_size, 100);
        assert!(config.validate().is_ok());
    }

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    const BATCH_VAR: &str = "FAVORITES_CACHE_BATCH_SIZE";

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvVarGuard::set(BATCH_VAR, None);

        assert_eq!(ServiceConfig::from_env(), ServiceConfig::default());
    }

    #[test]
    fn test_config_from_env_reads_batch_size() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvVarGuard::set(BATCH_VAR, Some("25"));

        assert_eq!(ServiceConfig::from_env().batch_size, 25);
    }

    #[test]
    fn test_config_from_env_unparseable_falls_back() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvVarGuard::set(BATCH_VAR, Some("many"));

        assert_eq!(ServiceConfig::from_env().batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = ServiceConfig::new().with_batch_size(0);
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "batch_size"),
            other => panic!("Expected InvalidValue, got: {:?}", other),
        }
    }
}
