//! On-disk session snapshot
//!
//! File layout (`session.json`), one entry per document URI:
//!
//! ```json
//! {
//!   "documents": {
//!     "file:///notes.ke": {
//!       "text": "...",
//!       "savedAt": 1700000000000,
//!       "history": [{ "text": "...", "savedAt": 1700000000000 }]
//!     }
//!   }
//! }
//! ```
//!
//! Writes go to a sibling `.tmp` file which is then renamed over the
//! snapshot, so a crash mid-write never leaves a truncated file behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DEFAULT_HISTORY_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub text: String,
    /// Unix time in milliseconds
    pub saved_at: i64,
}

/// Saved state of one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub text: String,
    pub saved_at: i64,
    /// Oldest first
    pub history: Vec<HistoryEntry>,
}

/// Contents of the snapshot file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub documents: BTreeMap<String, DocumentSnapshot>,
}

impl SessionSnapshot {
    pub fn document(&self, uri: &str) -> Option<&DocumentSnapshot> {
        self.documents.get(uri)
    }
}

/// Snapshot file plus an in-memory copy of its last known contents
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    history_limit: usize,
    cached: Mutex<Option<SessionSnapshot>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            cached: Mutex::new(None),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot; a missing file is an empty session
    pub fn load(&self) -> Result<SessionSnapshot> {
        if let Some(snapshot) = self.cached.lock().as_ref() {
            return Ok(snapshot.clone());
        }

        let snapshot = if self.path.exists() {
            let json = std::fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read snapshot {}", self.path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Corrupt snapshot {}", self.path.display()))?
        } else {
            SessionSnapshot::default()
        };

        *self.cached.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Saved state of the document at `uri`
    pub fn document(&self, uri: &str) -> Result<Option<DocumentSnapshot>> {
        Ok(self.load()?.documents.remove(uri))
    }

    /// Store `text` as the current contents of `uri`; see [`record_all`](Self::record_all)
    pub fn record(&self, uri: &str, text: &str) -> Result<()> {
        self.record_all([(uri.to_string(), text.to_string())])
    }

    /// Store each `(uri, text)` pair as that document's current contents and
    /// append it to the document's history unless it equals the newest
    /// entry. One file write covers the whole batch.
    pub fn record_all(&self, entries: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        let mut snapshot = self.load().unwrap_or_else(|e| {
            warn!("Discarding unreadable snapshot: {:#}", e);
            SessionSnapshot::default()
        });

        let now = unix_millis();
        let mut recorded = 0;
        for (uri, text) in entries {
            let document = snapshot.documents.entry(uri).or_default();
            document.saved_at = now;

            if document.history.last().map(|entry| entry.text.as_str()) != Some(text.as_str()) {
                document.history.push(HistoryEntry {
                    text: text.clone(),
                    saved_at: now,
                });
            }
            if document.history.len() > self.history_limit {
                let excess = document.history.len() - self.history_limit;
                document.history.drain(..excess);
            }
            document.text = text;
            recorded += 1;
        }
        if recorded == 0 {
            return Ok(());
        }

        self.write(&snapshot)?;
        debug!(
            "Saved session snapshot ({} of {} documents updated)",
            recorded,
            snapshot.documents.len()
        );
        *self.cached.lock() = Some(snapshot);
        Ok(())
    }

    /// Text of the newest history entry of `uri`, if any
    pub fn restore_last(&self, uri: &str) -> Result<Option<String>> {
        let document = self.document(uri)?;
        Ok(document.and_then(|d| d.history.last().map(|entry| entry.text.clone())))
    }

    /// Remove the snapshot file and forget the cached copy
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove snapshot {}", self.path.display()))?;
        }
        *self.cached.lock() = Some(SessionSnapshot::default());
        Ok(())
    }

    fn write(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move snapshot into {}", self.path.display()))?;
        Ok(())
    }
}

fn unix_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
