//! Persisted cosine-similarity index over embedded chunks.
//!
//! The store is a flat in-memory table serialized to a JSON snapshot. The
//! snapshot carries a manifest recording the embedding model identifier so
//! a query-time model mismatch can be detected instead of silently
//! degrading retrieval.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Identifier of the model that produced every vector in the store.
    pub embedding_model: String,
    /// Dimension of the stored vectors; 0 until the first insert.
    pub vector_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// A search result with its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkStore {
    manifest: IndexManifest,
    entries: Vec<StoredChunk>,
}

impl ChunkStore {
    #[must_use]
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            manifest: IndexManifest {
                embedding_model: embedding_model.into(),
                vector_size: 0,
            },
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.manifest.embedding_model
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a chunk with this content hash is already indexed.
    #[must_use]
    pub fn contains_hash(&self, content_hash: &str) -> bool {
        self.entries.iter().any(|e| e.chunk.content_hash == content_hash)
    }

    /// Insert an embedded chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector dimension differs from previous inserts.
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if self.manifest.vector_size == 0 {
            self.manifest.vector_size = vector.len();
        } else if vector.len() != self.manifest.vector_size {
            return Err(IndexError::DimensionMismatch {
                expected: self.manifest.vector_size,
                found: vector.len(),
            });
        }
        self.entries.push(StoredChunk { chunk, vector });
        Ok(())
    }

    /// Nearest-neighbour search, most similar first.
    ///
    /// Read-only; ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query dimension does not match the index.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if self.manifest.vector_size != 0 && query.len() != self.manifest.vector_size {
            return Err(IndexError::DimensionMismatch {
                expected: self.manifest.vector_size,
                found: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|e| SearchHit {
                chunk: e.chunk.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Write the index snapshot to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        tracing::info!(chunks = self.entries.len(), path = %path.display(), "index snapshot saved");
        Ok(())
    }

    /// Load an index snapshot from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or the snapshot is corrupt.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let store: Self = serde_json::from_slice(&bytes)?;
        tracing::info!(
            chunks = store.entries.len(),
            model = %store.manifest.embedding_model,
            "index snapshot loaded"
        );
        Ok(store)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: id.into(),
            path: format!("src/{id}.rs"),
            start_line: 1,
            end_line: 10,
            text: format!("body of {id}"),
            content_hash: format!("hash-{id}"),
        }
    }

    fn store_with(vectors: &[(&str, Vec<f32>)]) -> ChunkStore {
        let mut store = ChunkStore::new("test-embed");
        for (id, v) in vectors {
            store.insert(chunk(id), v.clone()).unwrap();
        }
        store
    }

    #[test]
    fn search_orders_by_similarity() {
        let store = store_with(&[
            ("far", vec![0.0, 1.0]),
            ("near", vec![1.0, 0.0]),
            ("mid", vec![1.0, 1.0]),
        ]);
        let hits = store.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits[0].chunk.id, "near");
        assert_eq!(hits[1].chunk.id, "mid");
        assert_eq!(hits[2].chunk.id, "far");
    }

    #[test]
    fn search_respects_limit() {
        let store = store_with(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.9, 0.1]),
            ("c", vec![0.8, 0.2]),
        ]);
        assert_eq!(store.search(&[1.0, 0.0], 2).unwrap().len(), 2);
    }

    #[test]
    fn dimension_mismatch_on_insert() {
        let mut store = store_with(&[("a", vec![1.0, 0.0])]);
        let result = store.insert(chunk("b"), vec![1.0, 0.0, 0.0]);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn dimension_mismatch_on_search() {
        let store = store_with(&[("a", vec![1.0, 0.0])]);
        let result = store.search(&[1.0, 0.0, 0.0], 5);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn contains_hash() {
        let store = store_with(&[("a", vec![1.0, 0.0])]);
        assert!(store.contains_hash("hash-a"));
        assert!(!store.contains_hash("hash-z"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("index.json");

        let store = store_with(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        store.save(&path).unwrap();

        let loaded = ChunkStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.embedding_model(), "test-embed");
        let hits = loaded.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].chunk.id, "a");
    }

    #[test]
    fn load_missing_file_errors() {
        let result = ChunkStore::load(Path::new("/nonexistent/index.json"));
        assert!(matches!(result, Err(IndexError::Io(_))));
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_identical_is_one() {
        let s = cosine_similarity(&[0.6, 0.8], &[0.6, 0.8]);
        assert!((s - 1.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn search_scores_non_increasing(
            vectors in proptest::collection::vec(
                proptest::collection::vec(-1.0f32..1.0, 4),
                1..20,
            ),
            query in proptest::collection::vec(-1.0f32..1.0, 4),
            limit in 1usize..10,
        ) {
            let mut store = ChunkStore::new("m");
            for (i, v) in vectors.iter().enumerate() {
                store.insert(chunk(&format!("c{i}")), v.clone()).unwrap();
            }
            let hits = store.search(&query, limit).unwrap();
            prop_assert!(hits.len() <= limit);
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
