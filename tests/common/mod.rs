//! Shared fixtures for the integration tests
#![allow(dead_code)]

pub mod host;
pub mod sources;

use std::sync::Arc;

use kanji_esperanto_server::completion::{CandidateResolver, CompletionProvider, ResolverOptions};
use kanji_esperanto_server::dictionary::{BucketStore, DictionaryItem, ShardSource};

pub use host::RecordingHost;
pub use sources::MockSource;

/// Provider over `source` with the given resolver options
pub fn provider_with(
    source: Arc<dyn ShardSource>,
    options: ResolverOptions,
) -> Arc<CompletionProvider> {
    let store = Arc::new(BucketStore::new(source));
    Arc::new(CompletionProvider::new(Arc::new(CandidateResolver::new(store, options))))
}

pub fn provider(source: Arc<dyn ShardSource>) -> Arc<CompletionProvider> {
    provider_with(source, ResolverOptions::default())
}

/// The `b` dictionary used across the end-to-end scenarios
pub fn b_words() -> Vec<DictionaryItem> {
    vec![
        DictionaryItem::new("bon", "好"),
        DictionaryItem::new("bona", "好a"),
        DictionaryItem::new("bela", "美a"),
        DictionaryItem::new("akvo", "水"),
    ]
}

/// Let spawned tasks run until `cond` holds (bounded)
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
