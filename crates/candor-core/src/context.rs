//! Assembles the evidence and history block handed to the generator.

use candor_index::RetrievedChunk;

use crate::config::ContextConfig;
use crate::history::Session;

/// Rough token estimate: four characters per token.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Prompt-ready context for one generation call.
#[derive(Debug, Clone)]
pub struct Context {
    /// Rendered evidence block with citation markers.
    pub evidence: String,
    /// Rendered prior exchanges, empty for a fresh session.
    pub history: String,
    /// Citation markers for the chunks that made it in, best first.
    pub citations: Vec<String>,
    /// Chunks dropped to stay within the token budget.
    pub dropped: usize,
}

impl Context {
    #[must_use]
    pub fn has_evidence(&self) -> bool {
        !self.citations.is_empty()
    }
}

pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Build a context from retrieved evidence and session history.
    ///
    /// Chunks are included in descending similarity order; when the token
    /// budget would be exceeded the lowest-scoring chunks are dropped
    /// first. History is never dropped, only capped at the configured
    /// number of most recent turns.
    #[must_use]
    pub fn build(&self, chunks: &[RetrievedChunk], session: &Session) -> Context {
        let history = self.render_history(session);
        let mut budget = self
            .config
            .budget_tokens
            .saturating_sub(estimate_tokens(&history));

        let mut evidence = String::new();
        let mut citations = Vec::new();
        let mut dropped = 0;

        for (i, chunk) in chunks.iter().enumerate() {
            let rendered = render_chunk(chunk);
            let cost = estimate_tokens(&rendered);
            if cost > budget && !citations.is_empty() {
                // kept chunks must be a prefix of the similarity ordering:
                // once one doesn't fit, everything weaker goes with it
                dropped = chunks.len() - i;
                break;
            }
            budget = budget.saturating_sub(cost);
            evidence.push_str(&rendered);
            citations.push(chunk.citation());
        }

        if dropped > 0 {
            tracing::debug!(kept = citations.len(), dropped, "evidence trimmed to budget");
        }

        Context {
            evidence,
            history,
            citations,
            dropped,
        }
    }

    fn render_history(&self, session: &Session) -> String {
        let mut out = String::new();
        for turn in session.recent(self.config.max_history_turns) {
            out.push_str("User: ");
            out.push_str(&turn.query);
            out.push_str("\nAssistant: ");
            out.push_str(&turn.answer);
            out.push_str("\n\n");
        }
        out
    }
}

fn render_chunk(chunk: &RetrievedChunk) -> String {
    format!("[{}]\n{}\n\n", chunk.citation(), chunk.chunk.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ConversationTurn;
    use candor_index::Chunk;
    use proptest::prelude::*;

    fn retrieved(id: &str, score: f32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: id.into(),
                path: format!("src/{id}.rs"),
                start_line: 1,
                end_line: 10,
                text: text.into(),
                content_hash: format!("h-{id}"),
            },
            score,
        }
    }

    fn builder(budget_tokens: usize) -> ContextBuilder {
        ContextBuilder::new(ContextConfig {
            budget_tokens,
            max_history_turns: 5,
        })
    }

    #[test]
    fn includes_all_chunks_within_budget() {
        let chunks = vec![
            retrieved("a", 0.9, "fn a() {}"),
            retrieved("b", 0.8, "fn b() {}"),
        ];
        let ctx = builder(1000).build(&chunks, &Session::default());
        assert_eq!(ctx.citations, ["src/a.rs:1-10", "src/b.rs:1-10"]);
        assert_eq!(ctx.dropped, 0);
        assert!(ctx.evidence.contains("[src/a.rs:1-10]"));
        assert!(ctx.evidence.contains("fn b() {}"));
    }

    #[test]
    fn drops_lowest_similarity_first() {
        let chunks = vec![
            retrieved("best", 0.9, &"x".repeat(100)),
            retrieved("worst", 0.4, &"y".repeat(4000)),
        ];
        let ctx = builder(200).build(&chunks, &Session::default());
        assert_eq!(ctx.citations, ["src/best.rs:1-10"]);
        assert_eq!(ctx.dropped, 1);
    }

    #[test]
    fn drop_cuts_off_everything_below_the_first_misfit() {
        let chunks = vec![
            retrieved("a", 0.9, &"x".repeat(200)),
            retrieved("b", 0.8, &"y".repeat(320)),
            retrieved("c", 0.5, &"z".repeat(160)),
        ];
        // c alone would fit in what's left after a, but b doesn't: keeping
        // c while dropping the stronger b would invert the ordering
        let ctx = builder(100).build(&chunks, &Session::default());
        assert_eq!(ctx.citations, ["src/a.rs:1-10"]);
        assert_eq!(ctx.dropped, 2);
    }

    #[test]
    fn keeps_best_chunk_even_over_budget() {
        let chunks = vec![retrieved("huge", 0.9, &"z".repeat(9000))];
        let ctx = builder(10).build(&chunks, &Session::default());
        assert_eq!(ctx.citations.len(), 1);
    }

    #[test]
    fn empty_retrieval_yields_no_evidence() {
        let ctx = builder(1000).build(&[], &Session::default());
        assert!(!ctx.has_evidence());
        assert!(ctx.evidence.is_empty());
    }

    #[test]
    fn history_is_capped_at_recent_turns() {
        let mut session = Session::new(10);
        for n in 1..=8 {
            session.record(ConversationTurn {
                query: format!("q{n}"),
                answer: format!("a{n}"),
                judge_score: None,
            });
        }
        let builder = ContextBuilder::new(ContextConfig {
            budget_tokens: 10_000,
            max_history_turns: 3,
        });
        let ctx = builder.build(&[], &session);
        assert!(!ctx.history.contains("q5"));
        assert!(ctx.history.contains("q6"));
        assert!(ctx.history.contains("q8"));
    }

    #[test]
    fn history_counts_against_budget() {
        let mut session = Session::default();
        session.record(ConversationTurn {
            query: "earlier question".into(),
            answer: "e".repeat(800),
            judge_score: None,
        });
        let chunks = vec![
            retrieved("a", 0.9, &"x".repeat(100)),
            retrieved("b", 0.5, &"y".repeat(400)),
        ];
        // history eats ~200 tokens of a 300 token budget
        let ctx = builder(300).build(&chunks, &session);
        assert_eq!(ctx.citations, ["src/a.rs:1-10"]);
        assert_eq!(ctx.dropped, 1);
    }

    #[test]
    fn token_estimate_is_chars_over_four() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    proptest! {
        #[test]
        fn kept_chunks_are_a_prefix_of_the_ordering(
            sizes in proptest::collection::vec(1usize..2000, 1..10),
            budget_tokens in 0usize..1500,
        ) {
            let chunks: Vec<RetrievedChunk> = sizes
                .iter()
                .enumerate()
                .map(|(i, len)| {
                    let score = 1.0 - 0.05 * i as f32;
                    retrieved(&format!("c{i}"), score, &"x".repeat(*len))
                })
                .collect();

            let ctx = builder(budget_tokens).build(&chunks, &Session::default());

            // the strongest chunk always survives, and every kept chunk is
            // stronger than every dropped one
            prop_assert!(!ctx.citations.is_empty());
            prop_assert_eq!(ctx.citations.len() + ctx.dropped, chunks.len());
            let expected: Vec<String> =
                chunks.iter().map(RetrievedChunk::citation).collect();
            prop_assert_eq!(&ctx.citations[..], &expected[..ctx.citations.len()]);
        }
    }
}
