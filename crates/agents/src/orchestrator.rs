//! Turn orchestration.
//!
//! Runs one conversation turn: greeting short-circuit, intent gate,
//! routing, concurrent per-source retrieve-then-generate tasks, event
//! multiplexing, final-answer composition and session persistence.
//!
//! Agent tasks write into a bounded channel consumed by the fan-in loop;
//! if the downstream consumer stalls, producers block rather than drop
//! events, so the per-agent citations-then-tokens-then-done ordering
//! always holds. Dropping the returned event stream aborts the turn and
//! every in-flight agent task.
//!
//! At most one in-flight turn per thread id is assumed; concurrent turns
//! on the same thread are a known limitation, not handled by locking.

use crate::agent::SourceAgent;
use crate::events::StreamEvent;
use crate::guardrail::{
    chunk_reply, greeting_message, guardrail_reply, is_greeting, personalize_reply,
    GUARDRAIL_CHUNK_CHARS,
};
use crate::intent::IntentGate;
use crate::router::Router;
use crate::session::{SessionStore, TurnMeta};
use crate::types::{ChatMessage, Citation, IntentLabel, RouteDecision, AGENT_GUARDRAIL};
use benebot_core::{AppError, AppResult, MemberProfile, Tuning};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Ordered event output of one turn.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Internal fan-in message from one agent task.
enum PumpEvent {
    Citations {
        agent: String,
        citations: Vec<Citation>,
    },
    Token {
        agent: String,
        token: String,
    },
    /// Terminal for a degraded agent; `message` replaces its buffer.
    Failed {
        agent: String,
        message: String,
    },
    Done {
        agent: String,
    },
}

/// Coordinates intent gating, routing and the per-source agents.
pub struct Orchestrator {
    intent: IntentGate,
    router: Router,
    agents: Vec<Arc<dyn SourceAgent>>,
    store: Arc<dyn SessionStore>,
    member: MemberProfile,
    tuning: Tuning,
}

impl Orchestrator {
    /// Agents must be supplied in composition priority order (benefits
    /// before claims).
    pub fn new(
        intent: IntentGate,
        router: Router,
        agents: Vec<Arc<dyn SourceAgent>>,
        store: Arc<dyn SessionStore>,
        member: MemberProfile,
        tuning: Tuning,
    ) -> Self {
        Self {
            intent,
            router,
            agents,
            store,
            member,
            tuning,
        }
    }

    /// Run one turn, returning its ordered event stream.
    ///
    /// The turn executes on a background task; dropping the stream
    /// cancels it. Every path ends with a `Final` event unless the
    /// consumer disconnects first.
    pub fn run_turn(self: &Arc<Self>, thread_id: &str, query: &str) -> EventStream {
        let (tx, rx) = mpsc::channel(self.tuning.event_buffer.max(1));
        let orchestrator = Arc::clone(self);
        let thread_id = thread_id.to_string();
        let query = query.to_string();
        let timeout = Duration::from_secs(self.tuning.turn_timeout_secs);

        let handle = tokio::spawn(async move {
            let driven = tokio::time::timeout(
                timeout,
                orchestrator.drive_turn(&thread_id, &query, &tx),
            )
            .await;
            match driven {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Turn for thread {} ended early: {}", thread_id, e);
                }
                Err(_) => {
                    tracing::warn!("Turn for thread {} timed out", thread_id);
                    // Partial buffers are discarded; nothing is persisted.
                    let _ = tx
                        .send(StreamEvent::Final {
                            thread_id: thread_id.clone(),
                            answer: "Sorry, this is taking longer than expected. Please try again."
                                .to_string(),
                        })
                        .await;
                }
            }
        });

        let guard = AbortOnDrop(handle);
        Box::pin(futures::stream::unfold(
            (rx, guard),
            |(mut rx, guard)| async move { rx.recv().await.map(|event| (event, (rx, guard))) },
        ))
    }

    async fn drive_turn(
        &self,
        thread_id: &str,
        query: &str,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> AppResult<()> {
        let started = Instant::now();

        // Greeting short-circuit, before any classification.
        if is_greeting(query) {
            emit(
                tx,
                StreamEvent::Route {
                    thread_id: thread_id.to_string(),
                    route: "greet".to_string(),
                },
            )
            .await?;
            let message = greeting_message(self.member.first());
            self.stream_canned(thread_id, &message, tx).await?;
            self.persist(thread_id, query, &message, "greet", started);
            return Ok(());
        }

        // Intent gate. Classifier failure is recovered by treating the
        // query as in-scope; routing has its own deterministic fallback.
        let label = match self.intent.classify(query).await {
            Ok((label, _scores)) => label,
            Err(e) => {
                tracing::warn!("Intent classification unavailable: {}", e);
                IntentLabel::InScope
            }
        };

        if label != IntentLabel::InScope {
            emit(
                tx,
                StreamEvent::Route {
                    thread_id: thread_id.to_string(),
                    route: AGENT_GUARDRAIL.to_string(),
                },
            )
            .await?;
            let reply = guardrail_reply(label).unwrap_or_default();
            let reply = personalize_reply(reply, self.member.first());
            self.stream_canned(thread_id, &reply, tx).await?;
            self.persist(thread_id, query, &reply, AGENT_GUARDRAIL, started);
            return Ok(());
        }

        // Routing and source selection.
        let route = self.router.route(query).await;
        emit(
            tx,
            StreamEvent::Route {
                thread_id: thread_id.to_string(),
                route: route.as_str().to_string(),
            },
        )
        .await?;

        let selected = self.select(route);
        if selected.is_empty() {
            let answer = format!(
                "Sorry {}, I couldn't determine a suitable source to answer that.",
                self.member.first()
            );
            emit(
                tx,
                StreamEvent::Final {
                    thread_id: thread_id.to_string(),
                    answer,
                },
            )
            .await?;
            return Ok(());
        }

        let history = self.load_history(thread_id);

        // Fan-out: one task per selected agent. The channel is bounded so
        // a stalled consumer backpressures producers instead of growing
        // memory.
        let (pump_tx, mut pump_rx) = mpsc::channel(self.tuning.event_buffer.max(1));
        let mut tasks = JoinSet::new();
        for agent in &selected {
            tasks.spawn(run_agent(
                Arc::clone(agent),
                query.to_string(),
                history.clone(),
                self.member.clone(),
                pump_tx.clone(),
            ));
        }
        drop(pump_tx);

        // Fan-in: forward events live while accumulating per-agent
        // buffers for final composition.
        let mut buffers: HashMap<String, String> = HashMap::new();
        let mut done = 0;
        while done < selected.len() {
            let Some(event) = pump_rx.recv().await else {
                break;
            };
            match event {
                PumpEvent::Citations { agent, citations } => {
                    emit(tx, StreamEvent::Citations { agent, citations }).await?;
                }
                PumpEvent::Token { agent, token } => {
                    buffers.entry(agent.clone()).or_default().push_str(&token);
                    emit(tx, StreamEvent::Token { agent, token }).await?;
                }
                PumpEvent::Failed { agent, message } => {
                    buffers.insert(agent.clone(), message.clone());
                    emit(
                        tx,
                        StreamEvent::Token {
                            agent: agent.clone(),
                            token: message,
                        },
                    )
                    .await?;
                    emit(tx, StreamEvent::Done { agent }).await?;
                    done += 1;
                }
                PumpEvent::Done { agent } => {
                    emit(tx, StreamEvent::Done { agent }).await?;
                    done += 1;
                }
            }
        }

        // Composition follows selection order, not completion order.
        let answer = if selected.len() == 1 {
            buffers.remove(selected[0].name()).unwrap_or_default()
        } else {
            selected
                .iter()
                .map(|agent| {
                    format!(
                        "**From {}:**\n{}",
                        source_label(agent.name()),
                        buffers.remove(agent.name()).unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        emit(
            tx,
            StreamEvent::Final {
                thread_id: thread_id.to_string(),
                answer: answer.clone(),
            },
        )
        .await?;

        self.persist(thread_id, query, &answer, route.as_str(), started);
        Ok(())
    }

    fn select(&self, route: RouteDecision) -> Vec<Arc<dyn SourceAgent>> {
        self.agents
            .iter()
            .filter(|agent| match route {
                RouteDecision::Pdf => agent.name() == crate::types::AGENT_PDF,
                RouteDecision::Claims => agent.name() == crate::types::AGENT_CLAIMS,
                RouteDecision::Both => true,
            })
            .cloned()
            .collect()
    }

    fn load_history(&self, thread_id: &str) -> Vec<ChatMessage> {
        match self.store.load(thread_id) {
            Ok(Some(session)) => session.messages,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to load history for thread {}: {}", thread_id, e);
                Vec::new()
            }
        }
    }

    /// Stream a canned reply as fixed-size simulated tokens under the
    /// guardrail tag, then emit `Final`.
    async fn stream_canned(
        &self,
        thread_id: &str,
        text: &str,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> AppResult<()> {
        for piece in chunk_reply(text, GUARDRAIL_CHUNK_CHARS) {
            emit(
                tx,
                StreamEvent::Token {
                    agent: AGENT_GUARDRAIL.to_string(),
                    token: piece,
                },
            )
            .await?;
        }
        emit(
            tx,
            StreamEvent::Final {
                thread_id: thread_id.to_string(),
                answer: text.to_string(),
            },
        )
        .await
    }

    /// Record the completed turn. A persistence failure is logged, never
    /// surfaced: the answer has already been streamed.
    fn persist(&self, thread_id: &str, query: &str, answer: &str, route: &str, started: Instant) {
        let meta = TurnMeta {
            route: Some(route.to_string()),
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        if let Err(e) = self.store.append(
            thread_id,
            &ChatMessage::user(query),
            &ChatMessage::assistant(answer),
            &meta,
        ) {
            tracing::warn!("Failed to persist turn for thread {}: {}", thread_id, e);
        }
    }
}

/// One agent's unit of work: retrieve, emit citations, stream tokens,
/// terminate with done (or failed). Errors are isolated to this agent.
async fn run_agent(
    agent: Arc<dyn SourceAgent>,
    question: String,
    history: Vec<ChatMessage>,
    member: MemberProfile,
    tx: mpsc::Sender<PumpEvent>,
) {
    let name = agent.name().to_string();

    // Retrieval failure degrades to an empty context so the agent's
    // fallback sentence takes over.
    let (context, citations) = match agent.retrieve(&question).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Retrieval failed for agent {}: {}", name, e);
            (String::new(), Vec::new())
        }
    };
    let context = inject_profile(&context, &member);

    if tx
        .send(PumpEvent::Citations {
            agent: name.clone(),
            citations,
        })
        .await
        .is_err()
    {
        return;
    }

    let mut stream = match agent.stream_answer(&question, &history, Some(context)).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Generation failed to start for agent {}: {}", name, e);
            let _ = tx
                .send(PumpEvent::Failed {
                    agent: name,
                    message: degraded_message(),
                })
                .await;
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if !chunk.content.is_empty()
                    && tx
                        .send(PumpEvent::Token {
                            agent: name.clone(),
                            token: chunk.content,
                        })
                        .await
                        .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("Generation stream failed for agent {}: {}", name, e);
                let _ = tx
                    .send(PumpEvent::Failed {
                        agent: name,
                        message: degraded_message(),
                    })
                    .await;
                return;
            }
        }
    }

    let _ = tx.send(PumpEvent::Done { agent: name }).await;
}

/// Prefix retrieved context with the member profile header.
///
/// Applied strictly after retrieval so personalization never influences
/// the vector search. An empty context stays empty, preserving the
/// agent's no-context fallback.
fn inject_profile(context: &str, member: &MemberProfile) -> String {
    if context.trim().is_empty() {
        context.to_string()
    } else {
        format!("Member profile:\n- Name: {}\n\n{}", member.name, context)
    }
}

fn source_label(agent: &str) -> &str {
    match agent {
        crate::types::AGENT_PDF => "PDF",
        crate::types::AGENT_CLAIMS => "Claims",
        other => other,
    }
}

fn degraded_message() -> String {
    "(Sorry, this source ran into a problem answering that.)".to_string()
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> AppResult<()> {
    tx.send(event)
        .await
        .map_err(|_| AppError::Other("Event consumer disconnected".to_string()))
}

struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{IntentGate, IntentSeeds, IntentThresholds};
    use crate::router::{Router, RouterKeywords};
    use crate::session::MemorySessionStore;
    use crate::types::{AGENT_CLAIMS, AGENT_PDF};
    use benebot_llm::{LlmClient, LlmRequest, LlmResponse, TokenChunk, TokenStream};
    use benebot_prompt::PromptSet;
    use benebot_retrieval::embeddings::providers::trigram::TrigramProvider;
    use benebot_retrieval::EmbeddingProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRouteLlm {
        reply: String,
    }

    #[async_trait::async_trait]
    impl LlmClient for FixedRouteLlm {
        fn provider_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: "test".to_string(),
            })
        }

        async fn stream(&self, _request: &LlmRequest) -> AppResult<TokenStream> {
            Err(AppError::Llm("not supported".to_string()))
        }
    }

    struct MockAgent {
        name: &'static str,
        tokens: Vec<&'static str>,
        delay: Duration,
        fail_mid_stream: bool,
        retrieve_calls: Arc<AtomicUsize>,
    }

    impl MockAgent {
        fn new(name: &'static str, tokens: Vec<&'static str>) -> Self {
            Self {
                name,
                tokens,
                delay: Duration::ZERO,
                fail_mid_stream: false,
                retrieve_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn failing_mid_stream(mut self) -> Self {
            self.fail_mid_stream = true;
            self
        }
    }

    #[async_trait::async_trait]
    impl SourceAgent for MockAgent {
        fn name(&self) -> &str {
            self.name
        }

        async fn retrieve(&self, _question: &str) -> AppResult<(String, Vec<Citation>)> {
            self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
            Ok((
                format!("context for {}", self.name),
                vec![Citation {
                    source: format!("{}-doc", self.name),
                    page: Some(1),
                    id: None,
                    score: Some(0.9),
                }],
            ))
        }

        async fn stream_answer(
            &self,
            _question: &str,
            _history: &[ChatMessage],
            context: Option<String>,
        ) -> AppResult<TokenStream> {
            // The orchestrator always supplies post-retrieval context.
            assert!(context.is_some());
            let tokens: Vec<&'static str> = self.tokens.clone();
            let delay = self.delay;
            let fail = self.fail_mid_stream;
            let stream = futures::stream::iter(tokens.into_iter().enumerate())
                .then(move |(i, token)| async move {
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    if fail && i == 1 {
                        Err(AppError::Llm("stream broke".to_string()))
                    } else {
                        Ok(TokenChunk {
                            content: token.to_string(),
                            done: false,
                        })
                    }
                });
            Ok(Box::pin(stream))
        }

        async fn count(&self) -> i64 {
            self.tokens.len() as i64
        }
    }

    async fn orchestrator_with_tuning(
        route_reply: &str,
        agents: Vec<Arc<dyn SourceAgent>>,
        store: Arc<dyn SessionStore>,
        tuning: Tuning,
    ) -> Arc<Orchestrator> {
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(128));
        let intent = IntentGate::new(
            embeddings,
            &IntentSeeds::default(),
            IntentThresholds::default(),
        )
        .await
        .unwrap();
        let router = Router::new(
            Arc::new(FixedRouteLlm {
                reply: route_reply.to_string(),
            }),
            Arc::new(PromptSet::builtin().unwrap()),
            "router-model",
            RouterKeywords::default(),
        );
        Arc::new(Orchestrator::new(
            intent,
            router,
            agents,
            store,
            MemberProfile::default(),
            tuning,
        ))
    }

    async fn orchestrator(
        route_reply: &str,
        agents: Vec<Arc<dyn SourceAgent>>,
        store: Arc<dyn SessionStore>,
    ) -> Arc<Orchestrator> {
        orchestrator_with_tuning(route_reply, agents, store, Tuning::default()).await
    }

    async fn collect(stream: EventStream) -> Vec<StreamEvent> {
        stream.collect().await
    }

    fn concat_tokens(events: &[StreamEvent], agent: &str) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { agent: a, token } if a == agent => Some(token.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_greeting_short_circuit() {
        let pdf = Arc::new(MockAgent::new(AGENT_PDF, vec!["x"]));
        let retrieve_calls = Arc::clone(&pdf.retrieve_calls);
        let orch = orchestrator("pdf", vec![pdf], Arc::new(MemorySessionStore::new())).await;

        let events = collect(orch.run_turn("t1", "Hi")).await;

        assert!(matches!(
            &events[0],
            StreamEvent::Route { route, .. } if route == "greet"
        ));
        let text = concat_tokens(&events, AGENT_GUARDRAIL);
        assert!(text.contains("Hi Maria!"));
        assert!(matches!(
            events.last().unwrap(),
            StreamEvent::Final { answer, .. } if answer == &text
        ));
        assert_eq!(retrieve_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_medical_guardrail() {
        let pdf = Arc::new(MockAgent::new(AGENT_PDF, vec!["x"]));
        let retrieve_calls = Arc::clone(&pdf.retrieve_calls);
        let orch = orchestrator("pdf", vec![pdf], Arc::new(MemorySessionStore::new())).await;

        let events = collect(
            orch.run_turn("t1", "what medicine should I take for a headache"),
        )
        .await;

        assert!(matches!(
            &events[0],
            StreamEvent::Route { route, .. } if route == "guardrail"
        ));
        let text = concat_tokens(&events, AGENT_GUARDRAIL);
        assert!(text.contains("medical advice"));
        assert!(matches!(events.last().unwrap(), StreamEvent::Final { .. }));
        assert_eq!(retrieve_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_source_turn() {
        let pdf: Arc<dyn SourceAgent> =
            Arc::new(MockAgent::new(AGENT_PDF, vec!["Your copay ", "is $40."]));
        let store = Arc::new(MemorySessionStore::new());
        let orch = orchestrator("pdf", vec![pdf], store.clone()).await;

        let events = collect(orch.run_turn("t1", "what is my specialist copay")).await;

        assert!(matches!(
            &events[0],
            StreamEvent::Route { route, .. } if route == "pdf"
        ));
        assert!(matches!(
            &events[1],
            StreamEvent::Citations { agent, citations } if agent == "pdf" && citations.len() == 1
        ));
        let tokens = concat_tokens(&events, AGENT_PDF);
        assert_eq!(tokens, "Your copay is $40.");
        assert!(matches!(
            events.last().unwrap(),
            StreamEvent::Final { answer, .. } if answer == "Your copay is $40."
        ));

        // Persisted after Final.
        let session = store.load("t1").unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.last_route.as_deref(), Some("pdf"));
    }

    #[tokio::test]
    async fn test_per_agent_event_ordering() {
        let pdf: Arc<dyn SourceAgent> = Arc::new(
            MockAgent::new(AGENT_PDF, vec!["a", "b"]).with_delay(Duration::from_millis(5)),
        );
        let claims: Arc<dyn SourceAgent> = Arc::new(MockAgent::new(AGENT_CLAIMS, vec!["c"]));
        let orch =
            orchestrator("both", vec![pdf, claims], Arc::new(MemorySessionStore::new())).await;

        let events = collect(orch.run_turn("t1", "what is my specialist copay")).await;

        for agent in [AGENT_PDF, AGENT_CLAIMS] {
            let citations_at = events
                .iter()
                .position(|e| matches!(e, StreamEvent::Citations { agent: a, .. } if a == agent))
                .unwrap();
            let first_token_at = events
                .iter()
                .position(|e| matches!(e, StreamEvent::Token { agent: a, .. } if a == agent))
                .unwrap();
            let done_at = events
                .iter()
                .position(|e| matches!(e, StreamEvent::Done { agent: a } if a == agent))
                .unwrap();
            assert!(citations_at < first_token_at);
            assert!(first_token_at < done_at);
        }

        let final_at = events
            .iter()
            .position(|e| matches!(e, StreamEvent::Final { .. }))
            .unwrap();
        let last_done_at = events
            .iter()
            .rposition(|e| matches!(e, StreamEvent::Done { .. }))
            .unwrap();
        assert!(last_done_at < final_at);
        assert_eq!(final_at, events.len() - 1);
    }

    #[tokio::test]
    async fn test_both_composition_order_independent_of_completion() {
        // The pdf agent finishes well after claims.
        let pdf: Arc<dyn SourceAgent> = Arc::new(
            MockAgent::new(AGENT_PDF, vec!["pdf answer"]).with_delay(Duration::from_millis(30)),
        );
        let claims: Arc<dyn SourceAgent> =
            Arc::new(MockAgent::new(AGENT_CLAIMS, vec!["claims answer"]));
        let orch =
            orchestrator("both", vec![pdf, claims], Arc::new(MemorySessionStore::new())).await;

        let events = collect(orch.run_turn("t1", "what is my specialist copay")).await;

        let Some(StreamEvent::Final { answer, .. }) = events.last() else {
            panic!("missing final event");
        };
        let pdf_at = answer.find("**From PDF:**\npdf answer").unwrap();
        let claims_at = answer.find("**From Claims:**\nclaims answer").unwrap();
        assert!(pdf_at < claims_at);
    }

    #[tokio::test]
    async fn test_failing_agent_is_isolated() {
        let pdf: Arc<dyn SourceAgent> =
            Arc::new(MockAgent::new(AGENT_PDF, vec!["ok ", "fine"]));
        let claims: Arc<dyn SourceAgent> = Arc::new(
            MockAgent::new(AGENT_CLAIMS, vec!["partial ", "boom", "never"]).failing_mid_stream(),
        );
        let orch =
            orchestrator("both", vec![pdf, claims], Arc::new(MemorySessionStore::new())).await;

        let events = collect(orch.run_turn("t1", "what is my specialist copay")).await;

        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::Done { agent } if agent == AGENT_PDF)));
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::Done { agent } if agent == AGENT_CLAIMS)));

        let Some(StreamEvent::Final { answer, .. }) = events.last() else {
            panic!("missing final event");
        };
        assert!(answer.contains("**From PDF:**\nok fine"));
        assert!(answer.contains("ran into a problem"));
        assert!(!answer.contains("partial"));
    }

    #[tokio::test]
    async fn test_history_flows_into_next_turn() {
        let store = Arc::new(MemorySessionStore::new());
        let pdf: Arc<dyn SourceAgent> = Arc::new(MockAgent::new(AGENT_PDF, vec!["answer one"]));
        let orch = orchestrator("pdf", vec![pdf], store.clone()).await;

        let _ = collect(orch.run_turn("t1", "what is my specialist copay")).await;
        let _ = collect(orch.run_turn("t1", "is vision care covered under my plan")).await;

        let session = store.load("t1").unwrap().unwrap();
        assert_eq!(session.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_turn() {
        let pdf: Arc<dyn SourceAgent> = Arc::new(
            MockAgent::new(AGENT_PDF, vec!["a"; 50]).with_delay(Duration::from_millis(20)),
        );
        let store = Arc::new(MemorySessionStore::new());
        let orch = orchestrator("pdf", vec![pdf], store.clone()).await;

        let mut stream = orch.run_turn("t1", "what is my specialist copay");
        // Read a couple of events, then disconnect.
        let _ = stream.next().await;
        let _ = stream.next().await;
        drop(stream);

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Partial output was never persisted.
        assert!(store.load("t1").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_timeout_emits_apology_and_skips_persistence() {
        // The agent would need 5s per token; the deadline is 1s.
        let pdf: Arc<dyn SourceAgent> = Arc::new(
            MockAgent::new(AGENT_PDF, vec!["never ", "finishes"])
                .with_delay(Duration::from_secs(5)),
        );
        let store = Arc::new(MemorySessionStore::new());
        let tuning = Tuning {
            turn_timeout_secs: 1,
            ..Tuning::default()
        };
        let orch = orchestrator_with_tuning("pdf", vec![pdf], store.clone(), tuning).await;

        let events = collect(orch.run_turn("t1", "what is my specialist copay")).await;

        let Some(StreamEvent::Final { answer, .. }) = events.last() else {
            panic!("missing final event");
        };
        assert!(answer.contains("taking longer than expected"));
        assert!(!events
            .iter()
            .any(|e| matches!(e, StreamEvent::Token { .. })));
        assert!(store.load("t1").unwrap().is_none());
    }

    #[test]
    fn test_inject_profile() {
        let member = MemberProfile::default();
        let injected = inject_profile("Specialist copay is $40.", &member);
        assert!(injected.starts_with("Member profile:\n- Name: Maria Martinez\n\n"));
        assert!(injected.ends_with("Specialist copay is $40."));

        assert_eq!(inject_profile("", &member), "");
        assert_eq!(inject_profile("  \n", &member), "  \n");
    }
}
