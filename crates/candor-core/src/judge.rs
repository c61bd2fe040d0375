//! LLM-as-judge scoring of generated answers.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use candor_llm::provider::{Message, Role};
use candor_llm::{LlmProvider, parse};

use crate::context::Context;

/// Fallback score when the judge responds with something unparseable.
/// Sits in the middle of the scale: accepted, but flagged as unverified.
pub const FALLBACK_SCORE: u8 = 3;

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)score\D{0,10}([1-6])").expect("score regex is valid"));

/// Judge verdict on one answer.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Quality score on a 1 (fabricated) to 6 (fully grounded) scale.
    pub score: u8,
    pub reasoning: String,
    /// Critique to feed back into the generator on a retry.
    pub feedback: String,
    /// True when the score came from the fallback path, not the model.
    pub fallback: bool,
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    score: u8,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    feedback: String,
}

pub struct Judge<P: LlmProvider> {
    provider: Arc<P>,
}

impl<P: LlmProvider> Judge<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Score an answer against the evidence it was generated from.
    ///
    /// The judge never fails the pipeline: provider errors and garbage
    /// responses both collapse to [`FALLBACK_SCORE`] with a note, so a
    /// broken judge degrades to "unverified" rather than "broken".
    pub async fn evaluate(&self, query: &str, answer: &str, context: &Context) -> Verdict {
        let messages = [
            Message::new(Role::System, SYSTEM_PROMPT),
            Message::new(Role::User, render_case(query, answer, context)),
        ];

        let raw = match self.provider.chat(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("judge unavailable, answer accepted unverified: {e}");
                return fallback_verdict("judge provider was unavailable");
            }
        };

        match parse::from_response::<JudgeResponse>(&raw) {
            Ok(r) if (1..=6).contains(&r.score) => Verdict {
                score: r.score,
                reasoning: r.reasoning,
                feedback: r.feedback,
                fallback: false,
            },
            Ok(r) => {
                tracing::warn!(score = r.score, "judge score out of range, clamping");
                Verdict {
                    score: r.score.clamp(1, 6),
                    reasoning: r.reasoning,
                    feedback: r.feedback,
                    fallback: false,
                }
            }
            Err(_) => {
                // Second chance: pull "score: N" out of free text before
                // giving up on the response entirely.
                if let Some(score) = scavenge_score(&raw) {
                    tracing::debug!(score, "judge returned prose, score recovered");
                    Verdict {
                        score,
                        reasoning: raw.trim().to_string(),
                        feedback: String::new(),
                        fallback: false,
                    }
                } else {
                    tracing::warn!("unparseable judge response, answer accepted unverified");
                    fallback_verdict("judge response could not be parsed")
                }
            }
        }
    }
}

fn fallback_verdict(note: &str) -> Verdict {
    Verdict {
        score: FALLBACK_SCORE,
        reasoning: note.to_string(),
        feedback: String::new(),
        fallback: true,
    }
}

fn scavenge_score(text: &str) -> Option<u8> {
    SCORE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn render_case(query: &str, answer: &str, context: &Context) -> String {
    format!(
        "Question:\n{query}\n\nSource excerpts:\n{evidence}\nAnswer under review:\n{answer}",
        evidence = if context.evidence.is_empty() {
            "(none retrieved)\n"
        } else {
            context.evidence.as_str()
        },
    )
}

const SYSTEM_PROMPT: &str = "\
You grade answers produced by a code-answering assistant. Score how well \
the answer is grounded in the given source excerpts:

6 - fully grounded, every claim supported and cited
5 - grounded with minor uncited details
4 - mostly grounded, small unsupported additions
3 - partially grounded, noticeable unsupported claims
2 - weakly grounded, answer largely unsupported by the excerpts
1 - fabricated or contradicts the excerpts

Respond with JSON only:
{
  \"score\": 1-6,
  \"reasoning\": \"one or two sentences\",
  \"feedback\": \"concrete instructions for improving the answer\"
}";
