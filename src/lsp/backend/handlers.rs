//! LSP protocol handler implementations
//!
//! `tower_lsp::LanguageServer` for the Kanji Esperanto backend:
//! - Lifecycle handlers (initialize, initialized, shutdown)
//! - Document lifecycle (did_open, did_change, did_close); single-character
//!   edits are forwarded to the document's retrigger controller
//! - Completion (root candidates as snippet text edits)

use tower_lsp::{LanguageServer, jsonrpc};
use tower_lsp::lsp_types::{
    CompletionOptions, CompletionParams, CompletionResponse, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, InitializeParams, InitializeResult,
    InitializedParams, ServerCapabilities, ServerInfo, TextDocumentSyncCapability,
    TextDocumentSyncKind,
};
use tower_lsp::jsonrpc::Result as LspResult;

use tracing::{debug, info, warn};

use super::completion_response;
use super::state::KanjiBackend;

/// Every ASCII letter may extend a root
fn trigger_characters() -> Vec<String> {
    ('a'..='z').chain('A'..='Z').map(String::from).collect()
}

#[tower_lsp::async_trait]
impl LanguageServer for KanjiBackend {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        info!(
            "Received initialize from {}",
            params
                .client_info
                .as_ref()
                .map(|client| client.name.as_str())
                .unwrap_or("unknown client")
        );

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(trigger_characters()),
                    ..CompletionOptions::default()
                }),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        info!(
            "Server initialized; dictionary at {}",
            self.engine.store().source_description()
        );
    }

    async fn shutdown(&self) -> LspResult<()> {
        info!("Received shutdown request");
        self.shutdown_tasks().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        debug!("textDocument/didOpen: {} (version {})", document.uri, document.version);
        self.open_document(document.uri, document.version, &document.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        debug!("textDocument/didChange: {} (version {})", uri, version);

        let Some(session) = self.document(&uri) else {
            warn!("Failed to find document with URI={}", uri);
            return;
        };

        match self.apply_changes(&session, params.content_changes, version) {
            Ok(Some(event)) => {
                self.handle_edit(&session, event).await;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to apply changes to {}: {}", uri, e),
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        debug!("textDocument/didClose: {}", params.text_document.uri);
        self.close_document(&params.text_document.uri);
    }

    async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        debug!("Completion request at {}:{:?}", uri, position);

        let Some(session) = self.document(&uri) else {
            debug!("Document not found: {}", uri);
            return Ok(None);
        };

        let list = self.complete_at(&session, &position).await;
        Ok(Some(completion_response(list)))
    }
}
