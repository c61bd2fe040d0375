//! Pipeline orchestration: the state machine and the controller that
//! drives a query through it.

mod controller;
mod state;

pub use controller::PipelineController;
pub use state::{Event, RetryPolicy, Stage, transition};

use candor_index::IndexError;
use candor_llm::LlmError;

/// Errors that abort a pipeline run.
///
/// Router and judge failures are absorbed (fail open and fall back
/// respectively); only retrieval and generation failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("pipeline reached {0} without its required state")]
    State(&'static str),
}

/// Confidence band derived from the judge score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Band for a score given the accept threshold (scores at or above it
    /// are High, the fallback band 3..threshold is Medium, below is Low).
    #[must_use]
    pub fn from_score(score: u8, accept_threshold: u8) -> Self {
        if score >= accept_threshold {
            Self::High
        } else if score >= 3 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Final outcome of one query.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub answer: String,
    /// Citations extracted from the answer, in order of first appearance.
    pub citations: Vec<String>,
    /// Judge score, absent when the judge is disabled or was skipped.
    pub judge_score: Option<u8>,
    pub confidence: Option<Confidence>,
    pub retries_used: u32,
    /// False when the answer cites nothing despite available evidence.
    pub citations_valid: bool,
    /// True when the router turned the query away before retrieval.
    pub rejected: bool,
}
