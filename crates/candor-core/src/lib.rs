//! Query-time orchestration: routing, retrieval, context assembly,
//! generation, judging, validation, and per-session conversation state.

pub mod config;
pub mod context;
pub mod generator;
pub mod history;
pub mod judge;
pub mod pipeline;
pub mod router;
pub mod validator;

pub use config::Config;
pub use history::{ConversationTurn, Session};
pub use pipeline::{Confidence, PipelineController, PipelineError, PipelineResult};
