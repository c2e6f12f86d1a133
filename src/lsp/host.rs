//! Host surface backed by an LSP client
//!
//! The client owns the completion widget, so "show" and "hide" become a
//! custom `kanjiEsperanto/suggest` notification. The client extension answers
//! `show` by triggering a regular completion request and `hide` by closing
//! the widget.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tower_lsp::Client;
use tower_lsp::lsp_types::Url;
use tower_lsp::lsp_types::notification::Notification;
use tracing::trace;

use super::document::EditorDocument;
use crate::completion::{CaretContext, CaretSource, HostSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestAction {
    Show,
    Hide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestParams {
    pub uri: Url,
    pub action: SuggestAction,
}

/// `kanjiEsperanto/suggest` server → client notification
#[derive(Debug)]
pub enum SuggestNotification {}

impl Notification for SuggestNotification {
    type Params = SuggestParams;
    const METHOD: &'static str = "kanjiEsperanto/suggest";
}

/// Where suggest notifications go
#[async_trait]
pub trait SuggestSink: Send + Sync + 'static {
    async fn suggest(&self, params: SuggestParams);
}

#[async_trait]
impl SuggestSink for Client {
    async fn suggest(&self, params: SuggestParams) {
        self.send_notification::<SuggestNotification>(params).await;
    }
}

/// [`HostSurface`] view of one open document
pub struct LspHost {
    sink: Arc<dyn SuggestSink>,
    document: Arc<RwLock<EditorDocument>>,
}

impl LspHost {
    pub fn new(sink: Arc<dyn SuggestSink>, document: Arc<RwLock<EditorDocument>>) -> Self {
        Self { sink, document }
    }

    async fn send(&self, action: SuggestAction) {
        let uri = self.document.read().uri.clone();
        trace!("suggest {:?} for {}", action, uri);
        self.sink.suggest(SuggestParams { uri, action }).await;
    }
}

impl CaretSource for LspHost {
    fn caret_context(&self) -> CaretContext {
        self.document.read().caret_context()
    }
}

#[async_trait]
impl HostSurface for LspHost {
    async fn show_completions(&self) {
        self.send(SuggestAction::Show).await;
    }

    async fn hide_completions(&self) {
        self.send(SuggestAction::Hide).await;
    }
}

impl std::fmt::Debug for LspHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LspHost")
            .field("uri", &self.document.read().uri)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<SuggestParams>>,
    }

    #[async_trait]
    impl SuggestSink for RecordingSink {
        async fn suggest(&self, params: SuggestParams) {
            self.sent.lock().push(params);
        }
    }

    #[tokio::test]
    async fn test_host_forwards_actions_and_caret() {
        let uri = Url::parse("file:///tmp/a.ke").unwrap();
        let document = Arc::new(RwLock::new(EditorDocument::new(uri.clone(), 0, "更bon")));
        let sink = Arc::new(RecordingSink::default());
        let host = LspHost::new(sink.clone(), Arc::clone(&document));

        assert_eq!(host.caret_context(), CaretContext::new("更bon", 4));

        host.hide_completions().await;
        host.show_completions().await;

        let actions: Vec<SuggestAction> = sink.sent.lock().iter().map(|p| p.action).collect();
        assert_eq!(actions, vec![SuggestAction::Hide, SuggestAction::Show]);
        assert!(sink.sent.lock().iter().all(|p| p.uri == uri));
    }

    #[test]
    fn test_notification_wire_format() {
        let params = SuggestParams {
            uri: Url::parse("file:///x").unwrap(),
            action: SuggestAction::Show,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["action"], "show");
        assert_eq!(SuggestNotification::METHOD, "kanjiEsperanto/suggest");
    }
}
