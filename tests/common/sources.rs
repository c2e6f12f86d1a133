use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use kanji_esperanto_server::dictionary::{
    BucketKey, DictionaryItem, FetchAttempt, ShardError, ShardSource,
};

/// Scriptable shard source that records every fetch
#[derive(Default)]
pub struct MockSource {
    shards: HashMap<BucketKey, Vec<DictionaryItem>>,
    /// Number of upcoming fetches that fail
    failures: AtomicUsize,
    /// When set, every fetch waits for a permit
    gate: Option<Arc<Semaphore>>,
    fetches: AtomicUsize,
    attempts: Mutex<Vec<(BucketKey, FetchAttempt)>>,
}

impl MockSource {
    pub fn new(items: Vec<DictionaryItem>) -> Self {
        let mut shards: HashMap<BucketKey, Vec<DictionaryItem>> = HashMap::new();
        for item in items {
            if let Some(key) = BucketKey::for_root(&item.prefix) {
                shards.entry(key).or_default().push(item);
            }
        }
        Self {
            shards,
            ..Self::default()
        }
    }

    /// Put a shard under `key` without checking that its items belong there
    pub fn with_raw_shard(mut self, key: char, items: Vec<DictionaryItem>) -> Self {
        if let Some(key) = BucketKey::from_char(key) {
            self.shards.insert(key, items);
        }
        self
    }

    pub fn failing(self, count: usize) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }

    /// Gate fetches behind a semaphore the test releases
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> Vec<(BucketKey, FetchAttempt)> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl ShardSource for MockSource {
    async fn fetch(
        &self,
        key: BucketKey,
        attempt: FetchAttempt,
    ) -> Result<Vec<DictionaryItem>, ShardError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.attempts.lock().push((key, attempt));

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ShardError::Status { key, status: 503 });
        }

        Ok(self.shards.get(&key).cloned().unwrap_or_default())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
