//! Engine configuration
//!
//! Read from an optional JSON file (`--config`), then overridden by command
//! line flags. Every field has a default, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "dataDir": "./data",
//!   "suggestLimit": 100,
//!   "minRootLen": 1,
//!   "loadWaitMs": 150,
//!   "snapshotDebounceMs": 250
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of candidates in one list
pub const DEFAULT_SUGGEST_LIMIT: usize = 100;

/// Bounded size of the session history ring
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Quiet period before a document snapshot is written
pub const DEFAULT_SNAPSHOT_DEBOUNCE_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Directory holding `ke-a.json` .. `ke-z.json`
    pub data_dir: PathBuf,

    /// Optional `{"items": [...]}` file used when a letter's shard is empty
    pub fallback_file: Option<PathBuf>,

    pub suggest_limit: usize,

    /// Roots shorter than this never trigger a lookup
    pub min_root_len: usize,

    /// Match prefixes ignoring ASCII case
    pub case_insensitive: bool,

    /// How long a resolution waits for a loading shard before giving up
    /// (`None` waits for the load to finish)
    pub load_wait_ms: Option<u64>,

    /// Retry a failed shard fetch once with a cache-busting request
    pub retry_on_failure: bool,

    /// Start loading every shard at startup
    pub preload_all: bool,

    pub snapshot_debounce_ms: u64,

    pub history_limit: usize,

    /// Where session snapshots are stored; defaults to the user data directory
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            fallback_file: None,
            suggest_limit: DEFAULT_SUGGEST_LIMIT,
            min_root_len: 1,
            case_insensitive: false,
            load_wait_ms: None,
            retry_on_failure: true,
            preload_all: false,
            snapshot_debounce_ms: DEFAULT_SNAPSHOT_DEBOUNCE_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            snapshot_path: None,
        }
    }
}

impl EngineConfig {
    /// Load a configuration file, falling back to defaults for missing fields
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.suggest_limit == 0 {
            anyhow::bail!("suggestLimit must be at least 1");
        }
        if self.min_root_len == 0 {
            anyhow::bail!("minRootLen must be at least 1");
        }
        if self.history_limit == 0 {
            anyhow::bail!("historyLimit must be at least 1");
        }
        Ok(())
    }

    pub fn load_wait(&self) -> Option<Duration> {
        self.load_wait_ms.map(Duration::from_millis)
    }

    pub fn snapshot_debounce(&self) -> Duration {
        Duration::from_millis(self.snapshot_debounce_ms)
    }

    /// Snapshot file location: configured path or `<data dir>/kanji-esperanto/session.json`
    pub fn resolved_snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_path.clone().or_else(|| {
            dirs::data_local_dir().map(|dir| dir.join("kanji-esperanto").join("session.json"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.suggest_limit, 100);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.load_wait(), None);
    }

    #[test]
    fn test_camel_case_fields() {
        let json = r#"{"dataDir": "/srv/ke", "loadWaitMs": 150, "caseInsensitive": true}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/ke"));
        assert_eq!(config.load_wait(), Some(Duration::from_millis(150)));
        assert!(config.case_insensitive);
    }

    #[test]
    fn test_load_rejects_zero_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"suggestLimit": 0}"#).unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }
}
