//! Backend state management
//!
//! This module defines the KanjiBackend struct: the engine, the open
//! documents and, per document, the retrigger controller that drives the
//! client's completion widget.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Url;

use crate::completion::{CaretContext, RetriggerController};
use crate::engine::Engine;
use crate::lsp::document::EditorDocument;
use crate::lsp::host::SuggestSink;
use crate::session::SnapshotHandle;

/// Per-document session state
pub struct DocumentSession {
    pub(crate) document: Arc<RwLock<EditorDocument>>,
    /// Serializes edit events for this document
    pub(crate) controller: tokio::sync::Mutex<RetriggerController>,
    /// Token of the newest completion request; replaced (and the old one
    /// cancelled) by every new request
    pub(crate) request: Mutex<CancellationToken>,
}

impl DocumentSession {
    pub fn caret_context(&self) -> CaretContext {
        self.document.read().caret_context()
    }

    /// Cancel the in-flight completion request and return a token for a new one
    pub(crate) fn begin_request(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.request.lock(), token.clone());
        previous.cancel();
        token
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("uri", &self.document.read().uri)
            .field("version", &self.document.read().version)
            .finish()
    }
}

/// The Kanji Esperanto language server backend.
#[derive(Clone)]
pub struct KanjiBackend {
    pub(super) sink: Arc<dyn SuggestSink>,
    pub(super) engine: Engine,
    pub(super) documents: Arc<DashMap<Url, Arc<DocumentSession>>>,
    pub(super) snapshots: Option<Arc<SnapshotHandle>>,
}

impl std::fmt::Debug for KanjiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KanjiBackend")
            .field("engine", &self.engine)
            .field("documents", &self.documents.len())
            .field("snapshots", &self.snapshots.is_some())
            .finish()
    }
}
