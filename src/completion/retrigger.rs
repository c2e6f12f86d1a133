//! Retrigger controller: show, keep or hide the host's completion UI
//!
//! Driven by discrete edit events instead of timers:
//!
//! ```text
//! Insert(separator / non-letter) ──▶ hide, forget the shown fingerprint
//! Insert(letter) ──▶ prewarm shard ─▶ settle ─▶ resolve live root
//!                        ├─ same fingerprint as shown ──▶ Keep (no host call)
//!                        ├─ empty list ──────────────────▶ Hide
//!                        └─ otherwise ───────────────────▶ hide + show (Redisplay)
//! Delete ──▶ settle ─▶ resolve ─▶ hide + show unconditionally (Redisplay)
//! ```
//!
//! Hide-before-show makes the host recompute its filter state from scratch
//! instead of refining the previous list incrementally. A deletion can
//! re-enter a root that was already left, so it never takes the fingerprint
//! shortcut.
//!
//! The settle point is a single `yield_now`: it lets the host finish applying
//! the edit before the live caret is read.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::fingerprint::Fingerprint;
use super::provider::{CompletionProvider, HostSurface, Resolution};
use super::resolver::CandidateList;
use super::root::{extract_root, is_root_char};
use crate::dictionary::BucketKey;

/// A content-changing keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEvent {
    Insert(char),
    /// Backspace or delete, after the edit was applied
    Delete,
}

/// What the controller asked the host to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Hide,
    /// Leave the current list untouched
    Keep,
    /// Hide, then show again
    Redisplay,
}

pub struct RetriggerController {
    provider: Arc<CompletionProvider>,
    host: Arc<dyn HostSurface>,
    last_shown: Option<Fingerprint>,
}

impl RetriggerController {
    pub fn new(provider: Arc<CompletionProvider>, host: Arc<dyn HostSurface>) -> Self {
        Self {
            provider,
            host,
            last_shown: None,
        }
    }

    /// Fingerprint of the list the host was last asked to show
    pub fn last_shown(&self) -> Option<&Fingerprint> {
        self.last_shown.as_ref()
    }

    pub async fn on_event(&mut self, event: EditEvent) -> Decision {
        match event {
            EditEvent::Insert(ch) => self.on_insert(ch).await,
            EditEvent::Delete => self.on_delete().await,
        }
    }

    /// Handle an inserted character (the edit is already applied)
    pub async fn on_insert(&mut self, ch: char) -> Decision {
        if ch.is_whitespace() || !is_root_char(ch) {
            trace!("Separator {:?} typed, hiding completions", ch);
            self.last_shown = None;
            self.host.hide_completions().await;
            return Decision::Hide;
        }

        let caret = self.host.caret_context();
        let root = extract_root(&caret.line, caret.column);
        if let Some(key) = BucketKey::for_root(&root) {
            self.provider.store().prewarm(key);
        }

        tokio::task::yield_now().await;

        let list = match self.resolve().await {
            Resolution::Fresh(list) => list,
            // A newer edit owns the UI now
            Resolution::Stale { .. } | Resolution::Cancelled => return Decision::Keep,
        };

        if list.is_empty() {
            self.last_shown = None;
            self.host.hide_completions().await;
            return Decision::Hide;
        }

        let fingerprint = Fingerprint::of(&list);
        if self.last_shown.as_ref() == Some(&fingerprint) {
            trace!("Candidates for '{}' unchanged, keeping list", list.root);
            self.provider.store().metrics().record_suppressed_redisplay();
            return Decision::Keep;
        }

        self.redisplay(Some(fingerprint)).await;
        Decision::Redisplay
    }

    /// Handle a backspace/delete (the edit is already applied)
    pub async fn on_delete(&mut self) -> Decision {
        tokio::task::yield_now().await;

        let fingerprint = match self.resolve().await {
            Resolution::Fresh(list) => shown_fingerprint(&list),
            Resolution::Stale { .. } | Resolution::Cancelled => None,
        };

        self.redisplay(fingerprint).await;
        Decision::Redisplay
    }

    async fn resolve(&self) -> Resolution {
        self.provider
            .resolve_live(self.host.as_ref(), &CancellationToken::new())
            .await
    }

    async fn redisplay(&mut self, fingerprint: Option<Fingerprint>) {
        self.host.hide_completions().await;
        self.host.show_completions().await;
        self.provider.store().metrics().record_redisplay();
        self.last_shown = fingerprint;
    }
}

fn shown_fingerprint(list: &CandidateList) -> Option<Fingerprint> {
    (!list.is_empty()).then(|| Fingerprint::of(list))
}

impl std::fmt::Debug for RetriggerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetriggerController")
            .field("last_shown", &self.last_shown)
            .finish()
    }
}
