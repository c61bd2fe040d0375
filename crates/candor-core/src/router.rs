//! Relevance routing: decides whether a query belongs to the corpus at
//! all, and refines it for retrieval when it does.

use std::sync::Arc;

use serde::Deserialize;

use candor_llm::provider::{Message, Role};
use candor_llm::{LlmProvider, parse};

/// Routing outcome for one query.
#[derive(Debug, Clone)]
pub enum RouteDecision {
    /// Proceed through the pipeline with this retrieval query.
    Relevant { refined_query: String },
    /// Stop before retrieval and answer with this message.
    Rejected { message: String },
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    is_relevant: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    refined_query: Option<String>,
    #[serde(default)]
    rejection_message: Option<String>,
}

pub struct Router<P: LlmProvider> {
    provider: Arc<P>,
    corpus_name: String,
}

impl<P: LlmProvider> Router<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, corpus_name: impl Into<String>) -> Self {
        Self {
            provider,
            corpus_name: corpus_name.into(),
        }
    }

    /// Classify a query as in or out of scope for the corpus.
    ///
    /// Fails open: any provider error or unparseable response routes the
    /// original query through unchanged rather than blocking the user on
    /// a flaky classifier.
    pub async fn route(&self, query: &str) -> RouteDecision {
        let messages = [
            Message::new(Role::System, self.system_prompt()),
            Message::new(Role::User, query),
        ];

        let raw = match self.provider.chat(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("router unavailable, passing query through: {e}");
                return RouteDecision::Relevant {
                    refined_query: query.to_string(),
                };
            }
        };

        match parse::from_response::<RouteResponse>(&raw) {
            Ok(decision) if decision.is_relevant => {
                let refined = decision
                    .refined_query
                    .filter(|q| !q.trim().is_empty())
                    .unwrap_or_else(|| query.to_string());
                tracing::debug!(reason = %decision.reason, "query routed as relevant");
                RouteDecision::Relevant {
                    refined_query: refined,
                }
            }
            Ok(decision) => {
                tracing::info!(reason = %decision.reason, "query rejected by router");
                RouteDecision::Rejected {
                    message: decision.rejection_message.unwrap_or_else(|| {
                        format!(
                            "That question doesn't appear to be about {}. \
                             Try asking about its code, design, or behavior.",
                            self.corpus_name
                        )
                    }),
                }
            }
            Err(e) => {
                tracing::warn!("unparseable router response, passing query through: {e}");
                RouteDecision::Relevant {
                    refined_query: query.to_string(),
                }
            }
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You route questions for an assistant that answers strictly from \
             the source code of {corpus}.\n\
             Decide whether the user's question can be answered from that \
             codebase. Questions about its APIs, internals, configuration, \
             tests, or design are relevant. Greetings, small talk, and \
             questions about unrelated topics are not.\n\n\
             Respond with JSON only:\n\
             {{\n\
               \"is_relevant\": true | false,\n\
               \"reason\": \"one short sentence\",\n\
               \"refined_query\": \"a self-contained retrieval query, or null\",\n\
               \"rejection_message\": \"a polite redirect for the user, or null\"\n\
             }}\n\n\
             When relevant, rewrite the question into a refined_query that \
             stands alone without conversation context. When not relevant, \
             set rejection_message instead.",
            corpus = self.corpus_name
        )
    }
}
