//! Pager configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Error;
use crate::core::types::Result;

/// Settings for `DatabasePager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerConfig {
    /// Loads running at once.
    pub max_concurrent: usize,
    /// Seconds a paged child may go unrendered before it expires.
    pub expiry_delay: f64,
    /// Upper bound on evictions per `update`. `None` means unlimited.
    pub max_evictions_per_sweep: Option<usize>,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            expiry_delay: 10.0,
            max_evictions_per_sweep: None,
        }
    }
}

impl PagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::Config("max_concurrent must be at least 1".into()));
        }
        if !self.expiry_delay.is_finite() || self.expiry_delay < 0.0 {
            return Err(Error::Config(format!(
                "expiry_delay must be a non-negative number of seconds, got {}",
                self.expiry_delay
            )));
        }
        Ok(())
    }

    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file (sync). Missing fields take their defaults.
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PagerConfig::default();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.expiry_delay, 10.0);
        assert_eq!(config.max_evictions_per_sweep, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_workers = PagerConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(matches!(zero_workers.validate(), Err(Error::Config(_))));

        let negative_delay = PagerConfig {
            expiry_delay: -1.0,
            ..Default::default()
        };
        assert!(negative_delay.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("pager.json");

        let config = PagerConfig {
            max_concurrent: 2,
            expiry_delay: 3.5,
            max_evictions_per_sweep: Some(8),
        };
        config.save_sync(&path).unwrap();

        let loaded = PagerConfig::load_sync(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pager.json");
        std::fs::write(&path, r#"{ "expiry_delay": 30.0 }"#).unwrap();

        let loaded = PagerConfig::load_sync(&path).unwrap();
        assert_eq!(loaded.expiry_delay, 30.0);
        assert_eq!(loaded.max_concurrent, 4);
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            PagerConfig::load_sync(&temp.path().join("missing.json")),
            Err(Error::Io(_))
        ));

        let path = temp.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(PagerConfig::load_sync(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{ "max_concurrent": 0 }"#).unwrap();
        assert!(matches!(PagerConfig::load_sync(&path), Err(Error::Config(_))));
    }
}
