//! Pure pipeline state machine.
//!
//! [`transition`] is a total function of its inputs and performs no I/O;
//! the controller produces events by doing the actual work and asks this
//! module where to go next. That keeps every control-flow decision, in
//! particular the retry back-edge, testable without a provider.

/// Pipeline stages in their forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Route,
    Retrieve,
    BuildContext,
    Generate,
    Judge,
    Validate,
    Finalize,
}

/// Outcome of executing one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Routed { relevant: bool },
    Retrieved { hits: usize },
    ContextBuilt,
    Generated,
    Judged { score: u8 },
    JudgeSkipped,
    Validated,
}

/// Retry and short-circuit policy, fixed for the lifetime of a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of regeneration attempts after the first.
    pub max_retries: u32,
    /// Judge scores at or below this trigger a retry.
    pub retry_threshold: u8,
    /// Generate an explicit "nothing found" answer instead of
    /// short-circuiting when retrieval is empty.
    pub allow_no_evidence: bool,
    /// Retry via a fresh retrieval instead of regenerating over the same
    /// evidence.
    pub re_retrieve: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_threshold: 2,
            allow_no_evidence: false,
            re_retrieve: false,
        }
    }
}

/// Next stage after `event` occurred in `stage`.
///
/// The only back-edge is Judge to Generate (or Retrieve, when the policy
/// re-retrieves), taken when the score is at or below the retry threshold
/// and the retry budget is not exhausted. An event that does not belong
/// to the stage it was reported from finalizes the run.
#[must_use]
pub fn transition(stage: Stage, event: Event, retries_used: u32, policy: &RetryPolicy) -> Stage {
    match (stage, event) {
        (Stage::Route, Event::Routed { relevant: true }) => Stage::Retrieve,
        (Stage::Route, Event::Routed { relevant: false }) => Stage::Finalize,

        (Stage::Retrieve, Event::Retrieved { hits: 0 }) if !policy.allow_no_evidence => {
            Stage::Finalize
        }
        (Stage::Retrieve, Event::Retrieved { .. }) => Stage::BuildContext,

        (Stage::BuildContext, Event::ContextBuilt) => Stage::Generate,
        (Stage::Generate, Event::Generated) => Stage::Judge,

        (Stage::Judge, Event::Judged { score })
            if score <= policy.retry_threshold && retries_used < policy.max_retries =>
        {
            if policy.re_retrieve {
                Stage::Retrieve
            } else {
                Stage::Generate
            }
        }
        (Stage::Judge, Event::Judged { .. } | Event::JudgeSkipped) => Stage::Validate,

        (Stage::Validate, Event::Validated) => Stage::Finalize,

        (stage, event) => {
            tracing::error!(?stage, ?event, "event does not belong to stage");
            Stage::Finalize
        }
    }
}

/// True when `next` re-enters generation from the judge.
#[must_use]
pub fn is_retry_edge(stage: Stage, next: Stage) -> bool {
    stage == Stage::Judge && matches!(next, Stage::Generate | Stage::Retrieve)
}
