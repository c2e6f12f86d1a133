//! Engine assembly
//!
//! Wires a shard source, the bucket store, the resolver and the provider from
//! an [`EngineConfig`]. Both the LSP backend and the one-shot `complete`
//! command start from here.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::completion::{CandidateResolver, CompletionProvider, ResolverOptions};
use crate::config::EngineConfig;
use crate::dictionary::tools::read_document;
use crate::dictionary::{BucketStore, FsShardSource, ShardSource};
use crate::metrics::EngineMetrics;

#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    provider: Arc<CompletionProvider>,
}

impl Engine {
    /// Engine reading shards from `config.data_dir`
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let source = FsShardSource::new(config.data_dir.clone());
        Self::with_source(config, Arc::new(source))
    }

    pub fn with_source(config: EngineConfig, source: Arc<dyn ShardSource>) -> Result<Self> {
        config.validate()?;

        let store = BucketStore::new(source)
            .with_retry(config.retry_on_failure)
            .with_metrics(Arc::new(EngineMetrics::new()));
        info!("Dictionary source: {}", store.source_description());

        let mut resolver = CandidateResolver::new(Arc::new(store), ResolverOptions::from(&config));
        if let Some(path) = &config.fallback_file {
            let document = read_document(path)
                .with_context(|| format!("Failed to load fallback set {}", path.display()))?;
            info!("Loaded {} fallback items from {}", document.items.len(), path.display());
            resolver = resolver.with_fallback(document.items);
        }

        Ok(Self {
            config,
            provider: Arc::new(CompletionProvider::new(Arc::new(resolver))),
        })
    }

    /// Start background loads; must run inside a tokio runtime
    pub fn start(&self) {
        if self.config.preload_all {
            info!("Preloading all dictionary shards");
            self.provider.store().preload_all();
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<CompletionProvider> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<BucketStore> {
        self.provider.store()
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        self.store().metrics()
    }
}
