#![forbid(unsafe_code)]

//! Viewer configuration.
//!
//! Values come from three layers, later layers winning:
//!
//! 1. [`ViewerConfig::default`]
//! 2. An optional JSON file (missing keys keep their defaults)
//! 3. `DOCKVIEW_*` environment variables
//!
//! Every constructor validates before returning.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Default entries per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Default pagination ceiling.
pub const DEFAULT_MAX_PAGES: u32 = 50;
/// Default status poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const MAX_PAGE_SIZE: u32 = 1000;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io(std::io::Error),
    /// Config file is not valid JSON for [`ViewerConfig`].
    Parse(String),
    /// A value is out of range.
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error reading config: {e}"),
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
            ConfigError::Invalid { key, reason } => write!(f, "invalid {key}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(_) | ConfigError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Log viewer and status board settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Entries requested per page.
    pub page_size: u32,
    /// Backward pagination never requests a page above this.
    pub max_pages: u32,
    /// Status poll interval in milliseconds.
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    /// Deployment prefix stripped from container names for display.
    pub name_prefix: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            name_prefix: None,
        }
    }
}

impl ViewerConfig {
    /// Parse a JSON config document over the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file over the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Apply `DOCKVIEW_*` environment overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `DOCKVIEW_*` overrides from an arbitrary lookup.
    ///
    /// Recognized keys: `DOCKVIEW_PAGE_SIZE`, `DOCKVIEW_MAX_PAGES`,
    /// `DOCKVIEW_POLL_INTERVAL_MS`, `DOCKVIEW_NAME_PREFIX`.
    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(val) = lookup("DOCKVIEW_PAGE_SIZE") {
            self.page_size = parse_number("page_size", &val)?;
        }
        if let Some(val) = lookup("DOCKVIEW_MAX_PAGES") {
            self.max_pages = parse_number("max_pages", &val)?;
        }
        if let Some(val) = lookup("DOCKVIEW_POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(parse_number("poll_interval_ms", &val)?);
        }
        if let Some(val) = lookup("DOCKVIEW_NAME_PREFIX") {
            self.name_prefix = Some(val).filter(|v| !v.is_empty());
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                key: "page_size",
                reason: format!("must be in 1..={MAX_PAGE_SIZE}, got {}", self.page_size),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                key: "max_pages",
                reason: "must be at least 1".into(),
            });
        }
        if self.poll_interval < MIN_POLL_INTERVAL {
            return Err(ConfigError::Invalid {
                key: "poll_interval_ms",
                reason: format!(
                    "must be at least {}ms, got {}ms",
                    MIN_POLL_INTERVAL.as_millis(),
                    self.poll_interval.as_millis()
                ),
            });
        }
        Ok(())
    }

    /// Upper bound on buffered records for one dialog session.
    #[must_use]
    pub fn max_buffered(&self) -> usize {
        self.page_size as usize * self.max_pages as usize
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, val: &str) -> Result<T, ConfigError> {
    val.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("expected a number, got {val:?}"),
    })
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_observed_behavior() {
        let config = ViewerConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.max_buffered(), 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_overrides_only_given_keys() {
        let config = ViewerConfig::from_json_str(r#"{"page_size": 20}"#).unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_pages, DEFAULT_MAX_PAGES);

        let config = ViewerConfig::from_json_str(r#"{"poll_interval_ms": 2500}"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
    }

    #[test]
    fn json_rejects_unknown_keys() {
        let err = ViewerConfig::from_json_str(r#"{"pagesize": 20}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_win() {
        let config = ViewerConfig::default()
            .with_env_from(env(&[
                ("DOCKVIEW_PAGE_SIZE", "25"),
                ("DOCKVIEW_MAX_PAGES", "3"),
                ("DOCKVIEW_NAME_PREFIX", "panda-wiki-"),
            ]))
            .unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.name_prefix.as_deref(), Some("panda-wiki-"));
    }

    #[test]
    fn env_garbage_is_an_error() {
        let err = ViewerConfig::default()
            .with_env_from(env(&[("DOCKVIEW_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid page_size: expected a number, got \"lots\""
        );
    }

    #[test]
    fn validation_bounds() {
        let config = ViewerConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = ViewerConfig {
            max_pages: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = ViewerConfig {
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockview.json");
        std::fs::write(&path, r#"{"max_pages": 7}"#).unwrap();
        assert_eq!(ViewerConfig::load(&path).unwrap().max_pages, 7);

        let err = ViewerConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
