//! Shard sources: where the bucket store fetches shard documents from
//!
//! The [`BucketStore`](super::BucketStore) never touches files directly; it asks a
//! [`ShardSource`] for the items of one key. Two sources are provided:
//!
//! - [`FsShardSource`]: reads `<dir>/ke-<key>.json`
//! - [`StaticShardSource`]: serves shards from memory (embedding, tests, benches)
//!
//! Any error returned here is absorbed by the store: it retries once with
//! [`FetchAttempt::CacheBusted`] and then caches an empty bucket.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use super::{BucketKey, DictionaryItem, ShardDocument};

/// Which attempt of a load a fetch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttempt {
    /// First fetch; intermediate caches may be used
    Initial,
    /// Single retry after a failure; must bypass any intermediate cache
    CacheBusted { nonce: u64 },
}

/// Failure of a single shard fetch
#[derive(Debug, Error)]
pub enum ShardError {
    #[error("failed to read shard {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("shard '{key}' unavailable (status {status})")]
    Status { key: BucketKey, status: u16 },

    #[error("malformed shard '{key}': {source}")]
    Malformed {
        key: BucketKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Fetches the raw items of one shard
#[async_trait]
pub trait ShardSource: Send + Sync + 'static {
    async fn fetch(
        &self,
        key: BucketKey,
        attempt: FetchAttempt,
    ) -> Result<Vec<DictionaryItem>, ShardError>;

    /// Human readable location, used in log lines
    fn describe(&self) -> String;
}

/// Parse a shard document, mapping JSON errors to [`ShardError::Malformed`]
pub fn parse_shard(key: BucketKey, bytes: &[u8]) -> Result<Vec<DictionaryItem>, ShardError> {
    serde_json::from_slice::<ShardDocument>(bytes)
        .map(|doc| doc.items)
        .map_err(|source| ShardError::Malformed { key, source })
}

/// Reads shards from a directory laid out as `ke-a.json` .. `ke-z.json`
#[derive(Debug, Clone)]
pub struct FsShardSource {
    dir: PathBuf,
}

impl FsShardSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn shard_path(&self, key: BucketKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

#[async_trait]
impl ShardSource for FsShardSource {
    async fn fetch(
        &self,
        key: BucketKey,
        attempt: FetchAttempt,
    ) -> Result<Vec<DictionaryItem>, ShardError> {
        let path = self.shard_path(key);
        trace!("Reading shard {:?} ({:?})", path, attempt);

        // The filesystem has no intermediate cache, so a cache-busted retry is a plain re-read
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShardError::Status { key, status: 404 });
            }
            Err(source) => return Err(ShardError::Io { path, source }),
        };

        parse_shard(key, &bytes)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// In-memory shards, keyed by first letter
#[derive(Debug, Clone, Default)]
pub struct StaticShardSource {
    shards: HashMap<BucketKey, Vec<DictionaryItem>>,
}

impl StaticShardSource {
    /// Distribute items over shards by the first letter of their prefix.
    /// Items whose prefix does not start with an ASCII letter are skipped.
    pub fn from_items(items: impl IntoIterator<Item = DictionaryItem>) -> Self {
        let mut shards: HashMap<BucketKey, Vec<DictionaryItem>> = HashMap::new();
        for item in items {
            if let Some(key) = BucketKey::for_root(&item.prefix) {
                shards.entry(key).or_default().push(item);
            }
        }
        Self { shards }
    }

    pub fn keys(&self) -> impl Iterator<Item = &BucketKey> {
        self.shards.keys()
    }
}

#[async_trait]
impl ShardSource for StaticShardSource {
    async fn fetch(
        &self,
        key: BucketKey,
        _attempt: FetchAttempt,
    ) -> Result<Vec<DictionaryItem>, ShardError> {
        match self.shards.get(&key) {
            Some(items) => Ok(items.clone()),
            None => Err(ShardError::Status { key, status: 404 }),
        }
    }

    fn describe(&self) -> String {
        format!("<static: {} shards>", self.shards.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: &str) -> BucketKey {
        BucketKey::parse(c).unwrap()
    }

    #[tokio::test]
    async fn test_fs_source_reads_shard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ke-b.json"),
            r#"{"items": [{"prefix": "bon", "body": "好"}]}"#,
        )
        .unwrap();

        let source = FsShardSource::new(dir.path());
        let items = source.fetch(key("b"), FetchAttempt::Initial).await.unwrap();
        assert_eq!(items, vec![DictionaryItem::new("bon", "好")]);
    }

    #[tokio::test]
    async fn test_fs_source_missing_shard_is_status_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsShardSource::new(dir.path());
        let err = source.fetch(key("z"), FetchAttempt::Initial).await.unwrap_err();
        assert!(matches!(err, ShardError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fs_source_malformed_shard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ke-m.json"), r#"{"items": 12}"#).unwrap();
        let source = FsShardSource::new(dir.path());
        let err = source.fetch(key("m"), FetchAttempt::Initial).await.unwrap_err();
        assert!(matches!(err, ShardError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_static_source_splits_by_first_letter() {
        let source = StaticShardSource::from_items(vec![
            DictionaryItem::new("bon", "好"),
            DictionaryItem::new("Bela", "美"),
            DictionaryItem::new("akvo", "水"),
            DictionaryItem::new("9x", "skipped"),
        ]);
        let b = source.fetch(key("b"), FetchAttempt::Initial).await.unwrap();
        assert_eq!(b.len(), 2);
        let a = source.fetch(key("a"), FetchAttempt::Initial).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(source.keys().count(), 2);
    }
}
