use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, CompletionResponse, CompletionTextEdit,
    Documentation, InsertTextFormat, Position, TextDocumentContentChangeEvent, TextEdit, Url,
};
use tracing::{debug, info, trace, warn};

use crate::completion::{Candidate, Decision, EditEvent, HostSurface, RetriggerController};
use crate::engine::Engine;
use crate::lsp::document::EditorDocument;
use crate::lsp::host::{LspHost, SuggestSink};
use crate::metrics::MetricsSummary;
use crate::session::{SnapshotStore, spawn_snapshot_saver};

mod handlers;
mod state;

pub use state::{DocumentSession, KanjiBackend};

impl KanjiBackend {
    /// Creates the backend; must run inside a tokio runtime.
    ///
    /// Session snapshots are enabled when a snapshot path is known.
    pub fn new(sink: Arc<dyn SuggestSink>, engine: Engine, enable_snapshots: bool) -> Self {
        let snapshots = if enable_snapshots {
            engine.config().resolved_snapshot_path().map(|path| {
                info!("Session snapshots at {}", path.display());
                let store =
                    SnapshotStore::new(path).with_history_limit(engine.config().history_limit);
                let debounce = engine.config().snapshot_debounce();
                Arc::new(spawn_snapshot_saver(Arc::new(store), debounce))
            })
        } else {
            None
        };

        engine.start();

        Self {
            sink,
            engine,
            documents: Arc::new(DashMap::new()),
            snapshots,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn document(&self, uri: &Url) -> Option<Arc<DocumentSession>> {
        self.documents.get(uri).map(|entry| Arc::clone(entry.value()))
    }

    /// Register an opened document with its own controller
    pub fn open_document(&self, uri: Url, version: i32, text: &str) -> Arc<DocumentSession> {
        let document = Arc::new(RwLock::new(EditorDocument::new(uri.clone(), version, text)));
        let host: Arc<dyn HostSurface> =
            Arc::new(LspHost::new(Arc::clone(&self.sink), Arc::clone(&document)));
        let controller = RetriggerController::new(Arc::clone(self.engine.provider()), host);
        if let Some(snapshots) = &self.snapshots {
            snapshots.submit(uri.as_str(), text.to_string());
        }

        let session = Arc::new(DocumentSession {
            document,
            controller: tokio::sync::Mutex::new(controller),
            request: Mutex::new(CancellationToken::new()),
        });
        self.documents.insert(uri, Arc::clone(&session));
        session
    }

    pub fn close_document(&self, uri: &Url) {
        if let Some((_, session)) = self.documents.remove(uri) {
            session.request.lock().cancel();
        }
    }

    /// Apply content changes and report the new text to the snapshot saver.
    ///
    /// Every successful change is reported, whatever its shape: keystrokes,
    /// pastes, accepted completions and full-text syncs alike. Only single
    /// keystrokes come back as an [`EditEvent`] for the controller.
    pub fn apply_changes(
        &self,
        session: &DocumentSession,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: i32,
    ) -> Result<Option<EditEvent>, String> {
        let (event, uri, text) = {
            let mut document = session.document.write();
            let event = document.apply(changes, version)?;
            let text = self.snapshots.as_ref().map(|_| document.text.to_string());
            (event, document.uri.clone(), text)
        };

        if let (Some(snapshots), Some(text)) = (&self.snapshots, text) {
            snapshots.submit(uri.as_str(), text);
        }
        Ok(event)
    }

    /// Feed one applied keystroke to the document's controller
    pub async fn handle_edit(&self, session: &DocumentSession, event: EditEvent) -> Decision {
        let mut controller = session.controller.lock().await;
        let decision = controller.on_event(event).await;
        trace!("{:?} -> {:?}", event, decision);
        decision
    }

    /// Resolve completions at `position`
    pub async fn complete_at(
        &self,
        session: &DocumentSession,
        position: &Position,
    ) -> CompletionList {
        let cancel = session.begin_request();
        let caret_line = {
            let mut document = session.document.write();
            document.set_caret(position);
            document.caret.line
        };

        let host = LspHost::new(Arc::clone(&self.sink), Arc::clone(&session.document));
        let list = self.engine.provider().provide(&host, &cancel).await;
        debug!("Completion for '{}': {} items", list.root, list.len());

        let range = session.document.read().column_range(caret_line, list.replace);
        CompletionList {
            // Narrowing changes as the root grows, so the client must ask again
            is_incomplete: true,
            items: list
                .items
                .into_iter()
                .map(|candidate| completion_item(candidate, range))
                .collect(),
        }
    }

    /// `kanjiEsperanto/metrics` request: engine counters and timings
    pub async fn metrics(&self) -> tower_lsp::jsonrpc::Result<MetricsSummary> {
        Ok(self.engine.metrics().summary())
    }

    /// Write pending snapshots now
    pub async fn flush_snapshots(&self) {
        if let Some(snapshots) = &self.snapshots {
            snapshots.flush().await;
        }
    }

    /// Stop background tasks, flushing the pending snapshot
    pub async fn shutdown_tasks(&self) {
        if let Some(snapshots) = &self.snapshots {
            snapshots.shutdown().await;
        }
        let summary = self.engine.metrics().summary();
        match serde_json::to_string(&summary) {
            Ok(json) => info!("Engine metrics: {}", json),
            Err(e) => warn!("Failed to serialize metrics: {}", e),
        }
    }
}

fn completion_item(candidate: Candidate, range: tower_lsp::lsp_types::Range) -> CompletionItem {
    CompletionItem {
        label: candidate.label,
        kind: Some(CompletionItemKind::SNIPPET),
        detail: candidate.detail,
        documentation: candidate.documentation.map(Documentation::String),
        sort_text: Some(candidate.sort_text),
        filter_text: Some(candidate.prefix),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(range, candidate.insert_text))),
        preselect: Some(candidate.exact_prefix),
        ..CompletionItem::default()
    }
}

/// Wrap a list as a completion response
pub(crate) fn completion_response(list: CompletionList) -> CompletionResponse {
    CompletionResponse::List(list)
}
