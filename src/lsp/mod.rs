//! Language server surface
//!
//! - [`backend`]: `tower_lsp` backend holding the engine and open documents
//! - [`document`]: rope-backed document text, caret tracking, UTF-16 mapping
//! - [`host`]: the engine's host surface over an LSP client

pub mod backend;
pub mod document;
pub mod host;

pub use backend::{DocumentSession, KanjiBackend};
pub use host::{LspHost, SuggestAction, SuggestNotification, SuggestParams, SuggestSink};
