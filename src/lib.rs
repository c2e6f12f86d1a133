pub mod completion;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod logging;
pub mod lsp;
pub mod metrics;
pub mod session;
