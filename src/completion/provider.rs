//! Host-facing completion provider with the race guard
//!
//! Bucket loads and resolutions are asynchronous, so by the time a
//! resolution finishes the user may have typed on. Before a list is
//! delivered the provider:
//!
//! 1. honours the request's cancellation token (checked up front and raced
//!    against every suspension point),
//! 2. retries once when the result is empty only because the shard is still
//!    loading (transient-empty mitigation),
//! 3. re-extracts the root from the host's *current* caret context and
//!    discards the result if it no longer matches (stale result).
//!
//! Every failure path ends in an empty list; the provider never returns an
//! error to the host.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::resolver::{CandidateList, CandidateResolver};
use super::root::{extract_root, locate_root};
use crate::dictionary::{BucketKey, BucketStore};

/// Line text and caret column (zero-based, in characters) of the live editor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaretContext {
    pub line: String,
    pub column: usize,
}

impl CaretContext {
    pub fn new(line: impl Into<String>, column: usize) -> Self {
        Self {
            line: line.into(),
            column,
        }
    }
}

/// Read access to the live caret state of the host
pub trait CaretSource: Send + Sync {
    fn caret_context(&self) -> CaretContext;
}

/// A fixed caret context, for one-shot completions
impl CaretSource for CaretContext {
    fn caret_context(&self) -> CaretContext {
        self.clone()
    }
}

/// Everything the engine needs from the host editing surface
#[async_trait]
pub trait HostSurface: CaretSource {
    /// Ask the host to (re)open its completion UI; the host then calls the provider
    async fn show_completions(&self);

    async fn hide_completions(&self);
}

/// Outcome of one guarded resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Resolved for the root that is still live at the caret
    Fresh(CandidateList),
    /// The live root drifted while resolving; the result was discarded
    Stale { requested: String, live: String },
    Cancelled,
}

impl Resolution {
    /// Collapse into what the host receives: stale and cancelled become empty
    pub fn into_list(self) -> CandidateList {
        match self {
            Resolution::Fresh(list) => list,
            Resolution::Stale { live, .. } => CandidateList::empty_for(&live),
            Resolution::Cancelled => CandidateList::empty(),
        }
    }
}

/// The completion-provider function exposed to the host
#[derive(Debug, Clone)]
pub struct CompletionProvider {
    resolver: Arc<CandidateResolver>,
}

impl CompletionProvider {
    pub fn new(resolver: Arc<CandidateResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<CandidateResolver> {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<BucketStore> {
        self.resolver.store()
    }

    /// Provide candidates for the host's current caret position
    pub async fn provide<C>(&self, caret: &C, cancel: &CancellationToken) -> CandidateList
    where
        C: CaretSource + ?Sized,
    {
        self.resolve_live(caret, cancel).await.into_list()
    }

    /// One-shot completion for a fixed line and caret column
    pub async fn complete_line(&self, line: &str, column: usize) -> CandidateList {
        let caret = CaretContext::new(line, column);
        self.provide(&caret, &CancellationToken::new()).await
    }

    /// Guarded resolution keeping the reason a result was dropped
    pub async fn resolve_live<C>(&self, caret: &C, cancel: &CancellationToken) -> Resolution
    where
        C: CaretSource + ?Sized,
    {
        let metrics = Arc::clone(self.store().metrics());
        if cancel.is_cancelled() {
            metrics.record_cancelled_request();
            return Resolution::Cancelled;
        }

        let requested = caret.caret_context();
        let span = locate_root(&requested.line, requested.column);
        if !self.resolver.accepts(&span.text) {
            trace!("Root {:?} too short to resolve", span.text);
            let empty = CandidateList::empty_for(&span.text).with_range(span.start, span.end);
            return Resolution::Fresh(empty);
        }

        let Some(mut list) = self.resolve_or_cancel(&span.text, cancel).await else {
            metrics.record_cancelled_request();
            return Resolution::Cancelled;
        };

        if list.is_empty() {
            let loading = BucketKey::for_root(&span.text)
                .filter(|&key| self.store().is_loading(key));
            if let Some(key) = loading {
                debug!(
                    "Empty result for '{}' while bucket '{}' loads, retrying once",
                    span.text, key
                );
                metrics.record_transient_retry();

                let settled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    _ = self.store().get_bucket(key) => true,
                };
                if !settled {
                    metrics.record_cancelled_request();
                    return Resolution::Cancelled;
                }
                match self.resolve_or_cancel(&span.text, cancel).await {
                    Some(retried) => list = retried,
                    None => {
                        metrics.record_cancelled_request();
                        return Resolution::Cancelled;
                    }
                }
            }
        }

        let live = caret.caret_context();
        let live_root = extract_root(&live.line, live.column);
        if live_root != span.text {
            debug!("Discarding stale candidates for '{}' (live root '{}')", span.text, live_root);
            metrics.record_stale_discard();
            return Resolution::Stale {
                requested: span.text,
                live: live_root,
            };
        }

        if cancel.is_cancelled() {
            metrics.record_cancelled_request();
            return Resolution::Cancelled;
        }

        Resolution::Fresh(list.with_range(span.start, span.end))
    }

    async fn resolve_or_cancel(
        &self,
        root: &str,
        cancel: &CancellationToken,
    ) -> Option<CandidateList> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            list = self.resolver.resolve(root) => Some(list),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::resolver::ResolverOptions;
    use crate::dictionary::{DictionaryItem, StaticShardSource};

    fn provider() -> CompletionProvider {
        let source = StaticShardSource::from_items(vec![
            DictionaryItem::new("bon", "good"),
            DictionaryItem::new("bona", "nice"),
        ]);
        let store = Arc::new(BucketStore::new(Arc::new(source)));
        CompletionProvider::new(Arc::new(CandidateResolver::new(store, ResolverOptions::default())))
    }

    #[tokio::test]
    async fn test_complete_line_sets_replacement_range() {
        let list = provider().complete_line("更bon", 4).await;
        assert_eq!(list.root, "bon");
        assert_eq!(list.len(), 2);
        assert_eq!((list.replace.start, list.replace.end), (1, 4));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let caret = CaretContext::new("bon", 3);
        let provider = provider();
        assert_eq!(provider.resolve_live(&caret, &cancel).await, Resolution::Cancelled);
        assert_eq!(provider.store().metrics().shard_fetches(), 0);
    }

    #[tokio::test]
    async fn test_no_root_no_lookup() {
        let provider = provider();
        assert!(provider.complete_line("bon ", 4).await.is_empty());
        assert_eq!(provider.store().metrics().shard_fetches(), 0);
    }
}
