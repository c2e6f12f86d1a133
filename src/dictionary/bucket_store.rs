//! Lazily loaded, coalescing cache of dictionary shards
//!
//! # Load states
//!
//! ```text
//! unrequested ──get/prewarm──▶ loading(shared) ──fetch ok──────────────▶ loaded(bucket)
//!                                  │
//!                                  └─fetch err─▶ retry (cache-busted) ──▶ loaded(bucket | empty)
//! ```
//!
//! A key is fetched at most once per store. Every caller that arrives while
//! a key is `loading` awaits the same [`Shared`] future, so N overlapping
//! requests observe exactly one fetch and the same `Arc` bucket.
//!
//! # Coalescing discipline
//!
//! The check-then-attach-or-start step runs under the `DashMap` entry lock
//! for the key and never awaits while holding it. The fetch itself runs in a
//! spawned task: dropping a caller (cancelled completion request) does not
//! stop the shard from being cached for later requests.
//!
//! # Failure policy
//!
//! Any fetch error (missing file, I/O, malformed JSON) triggers exactly one
//! retry with [`FetchAttempt::CacheBusted`]. If that fails too, an empty
//! bucket is cached so that later keystrokes do not hammer the source.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, trace, warn};

use super::source::{FetchAttempt, ShardSource};
use super::{Bucket, BucketKey, DictionaryItem, empty_bucket};
use crate::metrics::EngineMetrics;

type SharedLoad = Shared<BoxFuture<'static, Bucket>>;

enum Slot {
    Loading(SharedLoad),
    Loaded(Bucket),
}

/// Observable load state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Unrequested,
    Loading,
    /// Loaded with the given number of items (0 after a failed load)
    Loaded(usize),
}

/// Result of attaching to a key without awaiting it
enum Attach {
    Ready(Bucket),
    Pending(SharedLoad),
}

/// Owned shard cache for one editing session.
///
/// Constructed explicitly and handed to the components that need it
/// (resolver, provider, retrigger controller) behind an `Arc`.
pub struct BucketStore {
    source: Arc<dyn ShardSource>,
    slots: Arc<DashMap<BucketKey, Slot>>,
    metrics: Arc<EngineMetrics>,
    retry_on_failure: bool,
}

impl BucketStore {
    pub fn new(source: Arc<dyn ShardSource>) -> Self {
        Self {
            source,
            slots: Arc::new(DashMap::new()),
            metrics: Arc::new(EngineMetrics::new()),
            retry_on_failure: true,
        }
    }

    /// Disable or enable the single cache-busted retry after a failed fetch
    pub fn with_retry(mut self, retry_on_failure: bool) -> Self {
        self.retry_on_failure = retry_on_failure;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Get the bucket for a caller-supplied key.
    ///
    /// The key is lowercased; empty keys, multi-character keys and
    /// non-letters yield an empty bucket without any fetch.
    pub async fn get(&self, key: &str) -> Bucket {
        match BucketKey::parse(key) {
            Some(key) => self.get_bucket(key).await,
            None => {
                trace!("Rejected bucket key {:?}", key);
                self.metrics.record_rejected_key();
                empty_bucket()
            }
        }
    }

    /// Get the bucket for a validated key, loading it if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get_bucket(&self, key: BucketKey) -> Bucket {
        match self.attach(key) {
            Attach::Ready(bucket) => bucket,
            Attach::Pending(load) => load.await,
        }
    }

    /// Start loading `key` in the background if it has not been requested yet
    pub fn prewarm(&self, key: BucketKey) {
        if let Attach::Pending(_) = self.attach(key) {
            trace!("Prewarming bucket '{}'", key);
        }
    }

    /// Start loading every shard `a`..`z`
    pub fn preload_all(&self) {
        for key in BucketKey::all() {
            self.prewarm(key);
        }
        debug!("Preloading all buckets from {}", self.source.describe());
    }

    pub fn status(&self, key: BucketKey) -> LoadStatus {
        match self.slots.get(&key).as_deref() {
            None => LoadStatus::Unrequested,
            Some(Slot::Loading(_)) => LoadStatus::Loading,
            Some(Slot::Loaded(bucket)) => LoadStatus::Loaded(bucket.len()),
        }
    }

    pub fn is_loading(&self, key: BucketKey) -> bool {
        self.status(key) == LoadStatus::Loading
    }

    /// Attach to the current state of `key`, starting a load if unrequested.
    ///
    /// The entry lock is held from the check until the new `Loading` slot is
    /// inserted, and nothing in between suspends.
    fn attach(&self, key: BucketKey) -> Attach {
        match self.slots.entry(key) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Loaded(bucket) => {
                    self.metrics.record_cache_hit();
                    Attach::Ready(Arc::clone(bucket))
                }
                Slot::Loading(load) => {
                    self.metrics.record_coalesced_wait();
                    Attach::Pending(load.clone())
                }
            },
            Entry::Vacant(entry) => {
                let load = self.start_load(key);
                entry.insert(Slot::Loading(load.clone()));
                Attach::Pending(load)
            }
        }
    }

    fn start_load(&self, key: BucketKey) -> SharedLoad {
        let source = Arc::clone(&self.source);
        let slots = Arc::clone(&self.slots);
        let metrics = Arc::clone(&self.metrics);
        let retry = self.retry_on_failure;

        let task = tokio::spawn({
            let slots = Arc::clone(&slots);
            async move {
                let bucket = {
                    let _timing = metrics.time("bucket_load");
                    load_shard(source.as_ref(), key, &metrics, retry).await
                };
                slots.insert(key, Slot::Loaded(Arc::clone(&bucket)));
                bucket
            }
        });

        async move {
            match task.await {
                Ok(bucket) => bucket,
                Err(e) => {
                    warn!("Loading bucket '{}' aborted: {}", key, e);
                    let bucket = empty_bucket();
                    slots.insert(key, Slot::Loaded(Arc::clone(&bucket)));
                    bucket
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for BucketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketStore")
            .field("source", &self.source.describe())
            .field("keys", &self.slots.len())
            .field("retry_on_failure", &self.retry_on_failure)
            .finish()
    }
}

/// Fetch one shard with the single-retry policy; never fails.
async fn load_shard(
    source: &dyn ShardSource,
    key: BucketKey,
    metrics: &EngineMetrics,
    retry: bool,
) -> Bucket {
    metrics.record_shard_fetch();
    let result = match source.fetch(key, FetchAttempt::Initial).await {
        Ok(items) => Ok(items),
        Err(e) if retry => {
            debug!("Fetching bucket '{}' failed ({}), retrying once", key, e);
            metrics.record_shard_retry();
            metrics.record_shard_fetch();
            source
                .fetch(key, FetchAttempt::CacheBusted { nonce: cache_bust_nonce() })
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(items) => {
            let items = retain_bucket_members(key, items);
            debug!("Loaded bucket '{}' with {} items", key, items.len());
            Arc::from(items)
        }
        Err(e) => {
            warn!("Bucket '{}' unavailable from {}: {}", key, source.describe(), e);
            metrics.record_load_failure();
            empty_bucket()
        }
    }
}

/// Drop items that do not belong in bucket `key`
fn retain_bucket_members(key: BucketKey, mut items: Vec<DictionaryItem>) -> Vec<DictionaryItem> {
    let before = items.len();
    items.retain(|item| BucketKey::for_root(&item.prefix) == Some(key));
    if items.len() != before {
        warn!(
            "Dropped {} items from bucket '{}' whose prefix does not start with '{}'",
            before - items.len(),
            key,
            key
        );
    }
    items
}

fn cache_bust_nonce() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
