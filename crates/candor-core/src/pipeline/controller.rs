//! Drives a query through the pipeline stages.

use candor_index::{RetrievedChunk, Retriever};
use candor_llm::LlmProvider;

use crate::context::{Context, ContextBuilder};
use crate::generator::Generator;
use crate::history::{ConversationTurn, Session};
use crate::judge::Judge;
use crate::router::{RouteDecision, Router};
use crate::validator;

use super::state::{self, Event, RetryPolicy, Stage};
use super::{Confidence, PipelineError, PipelineResult};

/// Owns the pipeline components and runs queries through the state
/// machine in [`super::state`].
///
/// The controller does the I/O; every control-flow decision is delegated
/// to [`state::transition`]. Router and judge are optional and the
/// pipeline degrades gracefully without them.
pub struct PipelineController<P: LlmProvider> {
    router: Option<Router<P>>,
    retriever: Retriever<P>,
    context_builder: ContextBuilder,
    generator: Generator<P>,
    judge: Option<Judge<P>>,
    policy: RetryPolicy,
    accept_threshold: u8,
}

impl<P: LlmProvider> PipelineController<P> {
    #[must_use]
    pub fn new(
        retriever: Retriever<P>,
        context_builder: ContextBuilder,
        generator: Generator<P>,
    ) -> Self {
        Self {
            router: None,
            retriever,
            context_builder,
            generator,
            judge: None,
            policy: RetryPolicy::default(),
            accept_threshold: 5,
        }
    }

    #[must_use]
    pub fn with_router(mut self, router: Router<P>) -> Self {
        self.router = Some(router);
        self
    }

    #[must_use]
    pub fn with_judge(mut self, judge: Judge<P>) -> Self {
        self.judge = Some(judge);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_accept_threshold(mut self, threshold: u8) -> Self {
        self.accept_threshold = threshold;
        self
    }

    /// Run one query end to end.
    ///
    /// On success the exchange is recorded in `session`; on error the
    /// session is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns an error when retrieval or generation fails. Router and
    /// judge failures do not abort the run.
    pub async fn run(
        &self,
        query: &str,
        session: &mut Session,
    ) -> Result<PipelineResult, PipelineError> {
        let mut stage = Stage::Route;
        let mut retries_used: u32 = 0;

        let mut retrieval_query = query.to_string();
        let mut hits: Vec<RetrievedChunk> = Vec::new();
        let mut context: Option<Context> = None;
        let mut answer = String::new();
        let mut judge_score: Option<u8> = None;
        let mut feedback: Option<String> = None;
        let mut rejection: Option<String> = None;
        let mut citations: Vec<String> = Vec::new();
        let mut citations_valid = true;

        while stage != Stage::Finalize {
            tracing::debug!(?stage, retries_used, "entering stage");

            let event = match stage {
                Stage::Route => match &self.router {
                    Some(router) => match router.route(query).await {
                        RouteDecision::Relevant { refined_query } => {
                            retrieval_query = refined_query;
                            Event::Routed { relevant: true }
                        }
                        RouteDecision::Rejected { message } => {
                            rejection = Some(message);
                            Event::Routed { relevant: false }
                        }
                    },
                    None => Event::Routed { relevant: true },
                },

                Stage::Retrieve => {
                    hits = self.retriever.retrieve(&retrieval_query).await?;
                    Event::Retrieved { hits: hits.len() }
                }

                Stage::BuildContext => {
                    context = Some(self.context_builder.build(&hits, session));
                    Event::ContextBuilt
                }

                Stage::Generate => {
                    let Some(ctx) = context.as_ref() else {
                        return Err(PipelineError::State("generate"));
                    };
                    answer = self
                        .generator
                        .generate(query, ctx, feedback.as_deref())
                        .await?;
                    Event::Generated
                }

                Stage::Judge => match &self.judge {
                    Some(judge) => {
                        let Some(ctx) = context.as_ref() else {
                            return Err(PipelineError::State("judge"));
                        };
                        let verdict = judge.evaluate(query, &answer, ctx).await;
                        judge_score = Some(verdict.score);
                        feedback = Some(if verdict.feedback.is_empty() {
                            verdict.reasoning
                        } else {
                            verdict.feedback
                        });
                        Event::Judged {
                            score: verdict.score,
                        }
                    }
                    None => Event::JudgeSkipped,
                },

                Stage::Validate => {
                    let had_evidence = context.as_ref().is_some_and(Context::has_evidence);
                    let report = validator::validate(&answer, had_evidence);
                    citations = report.citations;
                    citations_valid = report.grounded;
                    Event::Validated
                }

                Stage::Finalize => unreachable!("loop exits before finalize"),
            };

            let next = state::transition(stage, event, retries_used, &self.policy);
            if state::is_retry_edge(stage, next) {
                retries_used += 1;
                tracing::info!(retries_used, "judge requested a retry");
            }
            stage = next;
        }

        let result = if let Some(message) = rejection {
            PipelineResult {
                answer: message,
                citations: Vec::new(),
                judge_score: None,
                confidence: None,
                retries_used: 0,
                citations_valid: true,
                rejected: true,
            }
        } else if context.is_none() {
            // retrieval came back empty and the policy short-circuits
            PipelineResult {
                answer: NO_EVIDENCE_ANSWER.to_string(),
                citations: Vec::new(),
                judge_score: None,
                confidence: None,
                retries_used: 0,
                citations_valid: true,
                rejected: false,
            }
        } else {
            PipelineResult {
                answer,
                citations,
                judge_score,
                confidence: judge_score.map(|s| Confidence::from_score(s, self.accept_threshold)),
                retries_used,
                citations_valid,
                rejected: false,
            }
        };

        session.record(ConversationTurn {
            query: query.to_string(),
            answer: result.answer.clone(),
            judge_score: result.judge_score,
        });
        tracing::info!(
            score = ?result.judge_score,
            retries = result.retries_used,
            citations = result.citations.len(),
            rejected = result.rejected,
            "query finished"
        );
        Ok(result)
    }
}

const NO_EVIDENCE_ANSWER: &str = "I couldn't find anything relevant to that \
in the indexed code. Try rephrasing with specific function, type, or module \
names.";

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ContextConfig;
    use candor_index::{Chunk, ChunkStore, RetrievalConfig};
    use candor_llm::mock::MockProvider;

    fn seeded_store() -> Arc<ChunkStore> {
        let mut store = ChunkStore::new("mock-embed");
        store
            .insert(
                Chunk {
                    id: "c1".into(),
                    path: "httpx/_client.py".into(),
                    start_line: 10,
                    end_line: 40,
                    text: "class Client: ...".into(),
                    content_hash: "h1".into(),
                },
                vec![1.0, 0.0],
            )
            .unwrap();
        Arc::new(store)
    }

    fn empty_store() -> Arc<ChunkStore> {
        Arc::new(ChunkStore::new("mock-embed"))
    }

    fn controller(
        store: Arc<ChunkStore>,
        generator_mock: &MockProvider,
    ) -> PipelineController<MockProvider> {
        let embed = Arc::new(MockProvider::default().with_embedding(vec![1.0, 0.0]));
        PipelineController::new(
            Retriever::new(store, embed, RetrievalConfig::default()),
            ContextBuilder::new(ContextConfig::default()),
            Generator::new(Arc::new(generator_mock.clone()), "httpx"),
        )
    }

    fn relevant_route() -> String {
        r#"{"is_relevant": true, "reason": "ok", "refined_query": "client construction"}"#.into()
    }

    fn judged(score: u8, feedback: &str) -> String {
        format!(r#"{{"score": {score}, "reasoning": "r", "feedback": "{feedback}"}}"#)
    }

    #[tokio::test]
    async fn happy_path_produces_cited_answer() {
        let generator = MockProvider::with_responses(vec![
            "The client pools connections [httpx/_client.py:10-40].".into(),
        ]);
        let router = MockProvider::with_responses(vec![relevant_route()]);
        let judge = MockProvider::with_responses(vec![judged(6, "")]);

        let controller = controller(seeded_store(), &generator)
            .with_router(Router::new(Arc::new(router), "httpx"))
            .with_judge(Judge::new(Arc::new(judge)));

        let mut session = Session::default();
        let result = controller.run("how is the client built?", &mut session).await.unwrap();

        assert!(!result.rejected);
        assert_eq!(result.citations, ["httpx/_client.py:10-40"]);
        assert_eq!(result.judge_score, Some(6));
        assert_eq!(result.confidence, Some(Confidence::High));
        assert_eq!(result.retries_used, 0);
        assert!(result.citations_valid);
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn rejection_skips_retrieval_and_generation() {
        let generator = MockProvider::default();
        // embedding provider that would fail if retrieval ran
        let mut embed = MockProvider::default();
        embed.fail_embed = true;
        let embed = Arc::new(embed);
        let router = MockProvider::with_responses(vec![
            r#"{"is_relevant": false, "reason": "weather", "rejection_message": "Ask about the code instead."}"#.into(),
        ]);

        let controller = PipelineController::new(
            Retriever::new(seeded_store(), embed, RetrievalConfig::default()),
            ContextBuilder::new(ContextConfig::default()),
            Generator::new(Arc::new(generator.clone()), "httpx"),
        )
        .with_router(Router::new(Arc::new(router), "httpx"));

        let mut session = Session::default();
        let result = controller.run("what's the weather?", &mut session).await.unwrap();

        assert!(result.rejected);
        assert_eq!(result.answer, "Ask about the code instead.");
        assert!(result.judge_score.is_none());
        assert_eq!(generator.chat_calls(), 0);
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn zero_evidence_short_circuits_before_generation() {
        let generator = MockProvider::default();
        let controller = controller(empty_store(), &generator);

        let mut session = Session::default();
        let result = controller.run("anything?", &mut session).await.unwrap();

        assert!(!result.rejected);
        assert!(result.answer.contains("couldn't find anything relevant"));
        assert!(result.citations.is_empty());
        assert_eq!(generator.chat_calls(), 0);
    }

    #[tokio::test]
    async fn low_score_triggers_one_retry_with_feedback() {
        let generator = MockProvider::with_responses(vec![
            "Vague first attempt.".into(),
            "Grounded second attempt [httpx/_client.py:10-40].".into(),
        ]);
        let judge = MockProvider::with_responses(vec![
            judged(2, "cite the excerpt you used"),
            judged(5, ""),
        ]);

        let controller =
            controller(seeded_store(), &generator).with_judge(Judge::new(Arc::new(judge)));

        let mut session = Session::default();
        let result = controller.run("q", &mut session).await.unwrap();

        assert_eq!(result.retries_used, 1);
        assert_eq!(result.judge_score, Some(5));
        assert!(result.answer.starts_with("Grounded second attempt"));
        assert_eq!(generator.chat_calls(), 2);

        let retry_messages = generator.call_messages(1).unwrap();
        let last = &retry_messages.last().unwrap().content;
        assert!(last.contains("cite the excerpt you used"));
    }

    #[tokio::test]
    async fn retry_budget_is_respected() {
        let generator = MockProvider::with_responses(vec!["bad".into(), "still bad".into()]);
        let judge = MockProvider::with_responses(vec![judged(1, "f"), judged(1, "f")]);

        let controller =
            controller(seeded_store(), &generator).with_judge(Judge::new(Arc::new(judge)));

        let mut session = Session::default();
        let result = controller.run("q", &mut session).await.unwrap();

        assert_eq!(result.retries_used, 1);
        assert_eq!(result.judge_score, Some(1));
        assert_eq!(result.confidence, Some(Confidence::Low));
        assert_eq!(generator.chat_calls(), 2);
    }

    #[tokio::test]
    async fn disabled_judge_yields_no_score() {
        let generator =
            MockProvider::with_responses(vec!["Answer [httpx/_client.py:10-40].".into()]);
        let controller = controller(seeded_store(), &generator);

        let mut session = Session::default();
        let result = controller.run("q", &mut session).await.unwrap();

        assert!(result.judge_score.is_none());
        assert!(result.confidence.is_none());
        assert_eq!(result.retries_used, 0);
    }

    #[tokio::test]
    async fn uncited_answer_flagged_invalid() {
        let generator = MockProvider::with_responses(vec!["No citations here.".into()]);
        let controller = controller(seeded_store(), &generator);

        let mut session = Session::default();
        let result = controller.run("q", &mut session).await.unwrap();

        assert!(!result.citations_valid);
        assert!(result.citations.is_empty());
    }

    #[tokio::test]
    async fn failed_run_leaves_session_untouched() {
        let generator = MockProvider::failing();
        let controller = controller(seeded_store(), &generator);

        let mut session = Session::default();
        let result = controller.run("q", &mut session).await;

        assert!(result.is_err());
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn judge_fallback_accepts_answer_unverified() {
        let generator =
            MockProvider::with_responses(vec!["Answer [httpx/_client.py:10-40].".into()]);
        let judge = MockProvider::with_responses(vec!["not json".into()]);

        let controller =
            controller(seeded_store(), &generator).with_judge(Judge::new(Arc::new(judge)));

        let mut session = Session::default();
        let result = controller.run("q", &mut session).await.unwrap();

        assert_eq!(result.judge_score, Some(3));
        assert_eq!(result.confidence, Some(Confidence::Medium));
        assert_eq!(result.retries_used, 0);
    }

    #[tokio::test]
    async fn router_failure_fails_open_into_pipeline() {
        let generator =
            MockProvider::with_responses(vec!["Answer [httpx/_client.py:10-40].".into()]);
        let router = MockProvider::failing();

        let controller = controller(seeded_store(), &generator)
            .with_router(Router::new(Arc::new(router), "httpx"));

        let mut session = Session::default();
        let result = controller.run("q", &mut session).await.unwrap();

        assert!(!result.rejected);
        assert_eq!(result.citations, ["httpx/_client.py:10-40"]);
    }
}
