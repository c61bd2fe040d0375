use serde::{Deserialize, Serialize};

/// A unit of retrievable evidence, created once during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// Source path relative to the corpus root.
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub content_hash: String,
}

impl Chunk {
    /// Citation marker in the exact `path:start-end` form the generator
    /// is instructed to emit and the validator checks for.
    #[must_use]
    pub fn citation(&self) -> String {
        format!("{}:{}-{}", self.path, self.start_line, self.end_line)
    }
}
