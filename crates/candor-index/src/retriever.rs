//! Query-time similarity retrieval over the persisted index.

use std::sync::Arc;

use crate::chunk::Chunk;
use crate::error::{IndexError, Result};
use crate::store::ChunkStore;
use candor_llm::LlmProvider;

/// Retrieval configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    /// Maximum chunks returned per query.
    pub top_k: usize,
    /// Minimum cosine similarity to accept.
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.3,
        }
    }
}

/// One retrieved piece of evidence; transient, lives for a single query.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl RetrievedChunk {
    #[must_use]
    pub fn citation(&self) -> String {
        self.chunk.citation()
    }
}

/// Embeds queries and searches the index; read-only with respect to the store.
pub struct Retriever<P: LlmProvider> {
    store: Arc<ChunkStore>,
    provider: Arc<P>,
    config: RetrievalConfig,
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(store: Arc<ChunkStore>, provider: Arc<P>, config: RetrievalConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Retrieve the chunks most similar to `query_text`.
    ///
    /// Results are sorted by descending similarity, truncated to `top_k`,
    /// and filtered to `score >= min_score`. An empty result is not an
    /// error. Refuses to run if the provider's embedding model differs
    /// from the one the index was built with.
    ///
    /// # Errors
    ///
    /// Returns an error on model mismatch or if embedding or search fails.
    pub async fn retrieve(&self, query_text: &str) -> Result<Vec<RetrievedChunk>> {
        let model = self
            .provider
            .embedding_model()
            .ok_or_else(|| IndexError::NoEmbeddings(self.provider.name().to_string()))?;
        if model != self.store.embedding_model() {
            return Err(IndexError::EmbeddingModelMismatch {
                indexed: self.store.embedding_model().to_string(),
                configured: model.to_string(),
            });
        }

        let query_vector = self.provider.embed(query_text).await?;
        let hits = self.store.search(&query_vector, self.config.top_k)?;

        let retrieved: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|h| h.score >= self.config.min_score)
            .map(|h| RetrievedChunk {
                chunk: h.chunk,
                score: h.score,
            })
            .collect();

        tracing::debug!(
            hits = retrieved.len(),
            top_k = self.config.top_k,
            min_score = self.config.min_score,
            "retrieval complete"
        );
        Ok(retrieved)
    }
}
