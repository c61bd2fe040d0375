//! Line-window chunking of source files.
//!
//! Chunks are fixed-size overlapping line windows rather than syntax-aware
//! units; the line numbers recorded here are the exact boundaries cited in
//! answers, so they are 1-based and inclusive.

use crate::chunk::Chunk;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Lines per chunk window.
    pub window_lines: usize,
    /// Lines shared between consecutive windows.
    pub overlap_lines: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window_lines: 40,
            overlap_lines: 8,
        }
    }
}

impl ChunkerConfig {
    fn step(&self) -> usize {
        self.window_lines.saturating_sub(self.overlap_lines).max(1)
    }
}

/// Split file contents into overlapping line-window chunks.
///
/// Windows consisting only of blank lines are dropped.
#[must_use]
pub fn chunk_text(path: &str, text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < lines.len() {
        let end = (start + config.window_lines).min(lines.len());
        let window = &lines[start..end];

        if window.iter().any(|l| !l.trim().is_empty()) {
            let body = window.join("\n");
            chunks.push(Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                path: path.to_string(),
                start_line: start + 1,
                end_line: end,
                text: body.clone(),
                content_hash: blake3::hash(body.as_bytes()).to_hex().to_string(),
            });
        }

        if end == lines.len() {
            break;
        }
        start += config.step();
    }

    chunks
}
