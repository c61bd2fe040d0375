//! Grounded answer generation from assembled context.

use std::sync::Arc;

use candor_llm::provider::{Message, Role};
use candor_llm::{LlmError, LlmProvider};

use crate::context::Context;

pub struct Generator<P: LlmProvider> {
    provider: Arc<P>,
    corpus_name: String,
}

impl<P: LlmProvider> Generator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, corpus_name: impl Into<String>) -> Self {
        Self {
            provider,
            corpus_name: corpus_name.into(),
        }
    }

    /// Generate an answer to `query` grounded in `context`.
    ///
    /// On a retry, `feedback` carries the judge's critique of the previous
    /// attempt so the model can do better than repeating itself.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider call fails; generation has no
    /// fallback answer.
    pub async fn generate(
        &self,
        query: &str,
        context: &Context,
        feedback: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut messages = vec![Message::new(Role::System, self.system_prompt(context))];
        if !context.history.is_empty() {
            messages.push(Message::new(
                Role::System,
                format!("Earlier conversation:\n\n{}", context.history),
            ));
        }
        messages.push(Message::new(Role::User, query));
        if let Some(feedback) = feedback {
            messages.push(Message::new(
                Role::User,
                format!(
                    "Your previous answer was judged insufficient: {feedback}\n\
                     Rewrite the answer addressing this critique. Only use the \
                     provided excerpts."
                ),
            ));
        }

        let answer = self.provider.chat(&messages).await?;
        tracing::debug!(
            chars = answer.len(),
            retry = feedback.is_some(),
            "answer generated"
        );
        Ok(answer)
    }

    fn system_prompt(&self, context: &Context) -> String {
        if context.has_evidence() {
            format!(
                "You answer questions about {corpus} using only the source \
                 excerpts below. Each excerpt is preceded by a marker like \
                 [path:start-end].\n\
                 Cite every claim with the marker of the excerpt that supports \
                 it, e.g. \"the pool is created lazily [httpx/_client.py:120-160]\".\n\
                 If the excerpts do not contain the answer, say so plainly \
                 instead of guessing.\n\n\
                 Excerpts:\n\n{evidence}",
                corpus = self.corpus_name,
                evidence = context.evidence,
            )
        } else {
            format!(
                "You answer questions about {corpus}, but no relevant source \
                 excerpts were found for this question. Say that the indexed \
                 code contains nothing relevant and suggest how the user \
                 might rephrase. Do not invent details or citations.",
                corpus = self.corpus_name,
            )
        }
    }
}
