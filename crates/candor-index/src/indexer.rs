//! One-time corpus ingestion: walk, chunk, embed, store.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ignore::WalkBuilder;

use crate::chunker::{ChunkerConfig, chunk_text};
use crate::error::{IndexError, Result};
use crate::store::ChunkStore;
use candor_llm::LlmProvider;

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// File extensions eligible for indexing.
    pub extensions: Vec<String>,
    /// Files larger than this are skipped.
    pub max_file_bytes: u64,
    pub chunker: ChunkerConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            extensions: ["rs", "py", "go", "js", "ts", "md", "toml"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_bytes: 512 * 1024,
            chunker: ChunkerConfig::default(),
        }
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub chunks_skipped: usize,
    pub duration_ms: u128,
}

pub struct CorpusIndexer<P: LlmProvider> {
    provider: Arc<P>,
    config: IndexerConfig,
}

impl<P: LlmProvider> CorpusIndexer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, config: IndexerConfig) -> Self {
        Self { provider, config }
    }

    /// Walk the corpus root and index every eligible file into `store`.
    ///
    /// Chunks whose content hash is already present are skipped, so
    /// re-running ingestion over an unchanged corpus is cheap.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot embed, the embedding model
    /// differs from the one recorded in the store, or an embedding call fails.
    pub async fn index_corpus(&self, root: &Path, store: &mut ChunkStore) -> Result<IndexReport> {
        let model = self
            .provider
            .embedding_model()
            .ok_or_else(|| IndexError::NoEmbeddings(self.provider.name().to_string()))?;
        if model != store.embedding_model() {
            return Err(IndexError::EmbeddingModelMismatch {
                indexed: store.embedding_model().to_string(),
                configured: model.to_string(),
            });
        }

        let start = Instant::now();
        let mut report = IndexReport::default();

        for entry in WalkBuilder::new(root).hidden(true).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !self.eligible(path) {
                continue;
            }
            if entry.metadata().map(|m| m.len() > self.config.max_file_bytes).unwrap_or(true) {
                tracing::debug!(path = %path.display(), "skipping oversized or unreadable file");
                continue;
            }

            let Ok(text) = std::fs::read_to_string(path) else {
                tracing::debug!(path = %path.display(), "skipping non-UTF-8 file");
                continue;
            };

            let rel = path.strip_prefix(root).unwrap_or(path);
            let chunks = chunk_text(&rel.to_string_lossy(), &text, &self.config.chunker);
            if chunks.is_empty() {
                continue;
            }

            report.files_indexed += 1;
            for chunk in chunks {
                if store.contains_hash(&chunk.content_hash) {
                    report.chunks_skipped += 1;
                    continue;
                }
                let vector = self.provider.embed(&chunk.text).await?;
                store.insert(chunk, vector)?;
                report.chunks_created += 1;
            }
        }

        report.duration_ms = start.elapsed().as_millis();
        tracing::info!(
            files = report.files_indexed,
            created = report.chunks_created,
            skipped = report.chunks_skipped,
            ms = report.duration_ms,
            "corpus indexed"
        );
        Ok(report)
    }

    fn eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.extensions.iter().any(|e| e == ext))
    }
}
