//! Corpus chunking, embedding index persistence, and similarity retrieval.

pub mod chunk;
pub mod chunker;
pub mod error;
pub mod indexer;
pub mod retriever;
pub mod store;

pub use chunk::Chunk;
pub use error::{IndexError, Result};
pub use retriever::{RetrievalConfig, RetrievedChunk, Retriever};
pub use store::ChunkStore;
