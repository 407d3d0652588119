//! Conversation engine — the thread API over the routing state machine.
//!
//! One engine serves many independent threads. Within a thread everything is
//! strictly sequential: an inbound user message or a resume signal advances
//! the machine one node at a time (handler node → router → executor or
//! gate), checkpointing after every externally observable transition. The
//! two suspension points are the interrupt gate (awaiting approval) and the
//! turn boundary (awaiting the next user message); both are cooperative and
//! everything needed to resume lives in the checkpoint.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::checkpoint::{Checkpoint, CheckpointStore, ResumePoint};
use crate::error::{ConciergeError, ConciergeResult};
use crate::eventlog::{DialogLogger, LogEntry, LogLevel};
use crate::executor::{last_error_text, ActionExecutor};
use crate::interrupt::{ApprovalSignal, GateState, PendingBatch};
use crate::node::HandlerNode;
use crate::port::DecisionPort;
use crate::registry::{ActionRegistry, HandlerSet};
use crate::router::{route, NextNode};
use crate::state::{ConversationState, UserContext};
use crate::types::{ActionRequest, HandlerId, Message};

/// Engine tuning knobs. Passed in explicitly; there is no global config.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Re-prompt ceiling for degenerate decisions (see `node`).
    pub max_decision_retries: usize,
    /// Hard cap on node transitions per turn, against routing livelock.
    pub max_steps: usize,
    /// Synthetic action-result text appended when a handler escalates back.
    pub resumption_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_decision_retries: 3,
            max_steps: 24,
            resumption_text: "Resuming dialog with the host assistant. Please reflect on \
                the past conversation and assist the user as needed."
                .into(),
        }
    }
}

/// What a driven turn yields back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The handler replied; the thread now waits for the next user message.
    Reply(Message),
    /// Suspended at the interrupt gate; resolve with
    /// [`ConversationEngine::resume_turn`].
    AwaitingApproval { requests: Vec<ActionRequest> },
}

pub struct ConversationEngine {
    ports: HashMap<HandlerId, Arc<dyn DecisionPort>>,
    handlers: Arc<HandlerSet>,
    executor: ActionExecutor,
    store: Arc<dyn CheckpointStore>,
    config: EngineConfig,
    logger: Arc<DialogLogger>,
    lanes: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationEngine {
    pub fn new(
        handlers: HandlerSet,
        registry: Arc<ActionRegistry>,
        store: Arc<dyn CheckpointStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ports: HashMap::new(),
            handlers: Arc::new(handlers),
            executor: ActionExecutor::new(registry),
            store,
            config,
            logger: Arc::new(DialogLogger::new()),
            lanes: DashMap::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<DialogLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Bind a decision port to a handler. Every handler in the set needs one
    /// before its first turn.
    pub fn bind_port(mut self, id: HandlerId, port: Arc<dyn DecisionPort>) -> Self {
        self.ports.insert(id, port);
        self
    }

    /// Start a new thread or continue an existing one with a user message.
    pub async fn run_turn(
        &self,
        thread_id: &str,
        user_message: impl Into<String>,
        user_context: UserContext,
    ) -> ConciergeResult<TurnOutcome> {
        let lane = self.lane(thread_id);
        let _guard = lane.lock().await;

        let mut state = match self.store.load(thread_id).await? {
            Some(cp) if cp.is_awaiting_approval() => {
                return Err(ConciergeError::ApprovalPending {
                    thread_id: thread_id.into(),
                });
            }
            Some(cp) => cp.state,
            None => ConversationState::new(user_context.clone()),
        };

        // context is supplied fresh each turn
        state.user_context = user_context;
        state.pending_error = None;
        state.append(Message::user(user_message));
        self.save(thread_id, &state, ResumePoint::NextUserMessage)
            .await?;

        self.drive(thread_id, state).await
    }

    /// Resolve a pending sensitive batch with an approval signal.
    pub async fn resume_turn(
        &self,
        thread_id: &str,
        signal: ApprovalSignal,
    ) -> ConciergeResult<TurnOutcome> {
        let lane = self.lane(thread_id);
        let _guard = lane.lock().await;

        let checkpoint =
            self.store
                .load(thread_id)
                .await?
                .ok_or_else(|| ConciergeError::ThreadNotFound {
                    thread_id: thread_id.into(),
                })?;

        let (mut state, batch) = match checkpoint.resume_point {
            ResumePoint::PendingApproval { batch } => (checkpoint.state, batch),
            ResumePoint::NextUserMessage => {
                return Err(ConciergeError::NoPendingApproval {
                    thread_id: thread_id.into(),
                });
            }
        };

        match signal {
            ApprovalSignal::Approve => {
                // Clear the pending batch before executing: a crash between
                // the write and the execution loses the approval, never
                // duplicates it (at-most-once per approval).
                self.save(thread_id, &state, ResumePoint::NextUserMessage)
                    .await?;

                self.logger.info(
                    "gate",
                    thread_id,
                    format!("{} -> {}", GateState::AwaitingApproval, GateState::Resumed),
                );

                let results = self
                    .executor
                    .execute(&batch.requests, &state.user_context)
                    .await;
                state.pending_error = last_error_text(&results);
                for message in results {
                    state.append(message);
                }
            }
            ApprovalSignal::Reject { feedback } => {
                self.logger.info(
                    "gate",
                    thread_id,
                    format!("{} -> {}", GateState::AwaitingApproval, GateState::Rejected),
                );
                for message in batch.rejection_messages(&feedback) {
                    state.append(message);
                }
            }
        }

        self.save(thread_id, &state, ResumePoint::NextUserMessage)
            .await?;
        self.drive(thread_id, state).await
    }

    /// Abandon a thread, discarding its checkpoint.
    pub async fn abort_thread(&self, thread_id: &str) -> ConciergeResult<()> {
        let lane = self.lane(thread_id);
        let _guard = lane.lock().await;
        self.store.delete(thread_id).await?;
        self.logger.info("engine", thread_id, "thread aborted");
        Ok(())
    }

    // ─── internals ──────────────────────────────────────────────────────

    /// Advance the state machine until it yields a reply or suspends at the
    /// interrupt gate.
    async fn drive(
        &self,
        thread_id: &str,
        mut state: ConversationState,
    ) -> ConciergeResult<TurnOutcome> {
        for _ in 0..self.config.max_steps {
            let active = state.dialog_stack.active();
            let descriptor =
                self.handlers
                    .get(active)
                    .ok_or_else(|| ConciergeError::UnknownHandler {
                        name: active.to_string(),
                    })?;
            let port = self
                .ports
                .get(&active)
                .ok_or_else(|| ConciergeError::UnknownHandler {
                    name: format!("no decision port bound for {active}"),
                })?;

            let node = HandlerNode::new(active, port.clone())
                .with_max_retries(self.config.max_decision_retries);
            let decision = node.run(&state).await?;

            let assistant = Message::from_decision(decision.content.as_deref(), &decision.requests);
            state.append(assistant.clone());

            let next = route(&decision, active, &descriptor.capabilities)?;
            match next {
                NextNode::EndTurn => {
                    self.save(thread_id, &state, ResumePoint::NextUserMessage)
                        .await?;
                    self.logger
                        .info("router", thread_id, format!("{active}: turn complete"));
                    return Ok(TurnOutcome::Reply(assistant));
                }
                NextNode::PopDialog => {
                    let owner = state.dialog_stack.pop();
                    for request in &decision.requests {
                        state.append(Message::action_result(
                            &request.request_id,
                            &self.config.resumption_text,
                            false,
                        ));
                    }
                    self.save(thread_id, &state, ResumePoint::NextUserMessage)
                        .await?;
                    self.logger.info(
                        "router",
                        thread_id,
                        format!("{active} escalated, control back to {owner}"),
                    );
                }
                NextNode::Delegate(target) => {
                    let entry_text = self
                        .handlers
                        .get(target)
                        .ok_or_else(|| ConciergeError::UnknownHandler {
                            name: target.to_string(),
                        })?
                        .entry_text
                        .clone();
                    state.dialog_stack.push(target);
                    for request in &decision.requests {
                        state.append(Message::action_result(
                            &request.request_id,
                            &entry_text,
                            false,
                        ));
                    }
                    self.save(thread_id, &state, ResumePoint::NextUserMessage)
                        .await?;
                    self.logger
                        .info("router", thread_id, format!("delegated to {target}"));
                }
                NextNode::SafeActions(handler) => {
                    let results = self
                        .executor
                        .execute(&decision.requests, &state.user_context)
                        .await;
                    state.pending_error = last_error_text(&results);
                    if let Some(err) = &state.pending_error {
                        self.logger
                            .warn("executor", thread_id, format!("{handler}: {err}"));
                    }
                    for message in results {
                        state.append(message);
                    }
                    self.save(thread_id, &state, ResumePoint::NextUserMessage)
                        .await?;
                }
                NextNode::SensitiveActions(handler) => {
                    let batch = PendingBatch::new(handler, decision.requests.clone());
                    let requests = batch.requests.clone();
                    self.save(
                        thread_id,
                        &state,
                        ResumePoint::PendingApproval { batch },
                    )
                    .await?;
                    self.logger.info(
                        "gate",
                        thread_id,
                        format!(
                            "{} -> {} ({} pending)",
                            GateState::Running,
                            GateState::AwaitingApproval,
                            requests.len()
                        ),
                    );
                    return Ok(TurnOutcome::AwaitingApproval { requests });
                }
            }
        }

        Err(ConciergeError::StepLimitExceeded {
            steps: self.config.max_steps,
        })
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
        resume_point: ResumePoint,
    ) -> ConciergeResult<()> {
        let checkpoint = Checkpoint::new(thread_id, state.clone(), resume_point);
        self.store.save(&checkpoint).await?;
        self.logger.log(
            &LogEntry::new(
                LogLevel::Debug,
                "checkpoint",
                format!("saved ({} messages)", checkpoint.state.history.len()),
            )
            .with_thread(thread_id),
        );
        Ok(())
    }

    fn lane(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.lanes
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::port::Decision;
    use crate::registry::{Action, ActionSchema};
    use crate::types::{ActionName, Classification};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    // ─── Scripted decision port ─────────────────────────────────────────

    struct ScriptedPort {
        decisions: StdMutex<Vec<Decision>>,
    }

    impl ScriptedPort {
        fn new(decisions: Vec<Decision>) -> Arc<Self> {
            Arc::new(Self {
                decisions: StdMutex::new(decisions),
            })
        }
    }

    #[async_trait]
    impl DecisionPort for ScriptedPort {
        async fn decide(
            &self,
            _history: &[Message],
            _user_context: &UserContext,
        ) -> ConciergeResult<Decision> {
            let mut decisions = self.decisions.lock().unwrap();
            if decisions.is_empty() {
                return Err(ConciergeError::Port("script exhausted".into()));
            }
            Ok(decisions.remove(0))
        }
    }

    // ─── Counting actions ───────────────────────────────────────────────

    struct CountingAction {
        name: ActionName,
        classification: Classification,
        output: String,
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Action for CountingAction {
        fn name(&self) -> ActionName {
            self.name
        }

        fn classification(&self) -> Classification {
            self.classification
        }

        fn schema(&self) -> ActionSchema {
            ActionSchema {
                name: self.name,
                description: "test action".into(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn invoke(
            &self,
            _arguments: serde_json::Value,
            _user_context: &UserContext,
        ) -> ConciergeResult<String> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    struct Fixture {
        engine: ConversationEngine,
        search_count: Arc<AtomicUsize>,
        update_count: Arc<AtomicUsize>,
    }

    fn fixture(primary: Vec<Decision>, flight: Vec<Decision>) -> Fixture {
        let search_count = Arc::new(AtomicUsize::new(0));
        let update_count = Arc::new(AtomicUsize::new(0));

        let mut registry = ActionRegistry::new();
        registry
            .register(Arc::new(CountingAction {
                name: ActionName::SearchFlights,
                classification: Classification::Safe,
                output: "LX0112 departs 2024-05-01 14:05".into(),
                invocations: search_count.clone(),
            }))
            .unwrap();
        registry
            .register(Arc::new(CountingAction {
                name: ActionName::UpdateTicketToNewFlight,
                classification: Classification::Sensitive,
                output: "Ticket successfully updated to new flight.".into(),
                invocations: update_count.clone(),
            }))
            .unwrap();
        let registry = Arc::new(registry);

        use crate::registry::{CapabilitySet, HandlerDescriptor};
        let descriptors = vec![
            HandlerDescriptor {
                id: HandlerId::Primary,
                capabilities: CapabilitySet::new([ActionName::SearchFlights], []),
                entry_text: String::new(),
                system_prompt: "supervisor".into(),
            },
            HandlerDescriptor {
                id: HandlerId::UpdateFlight,
                capabilities: CapabilitySet::new(
                    [ActionName::SearchFlights],
                    [ActionName::UpdateTicketToNewFlight],
                ),
                entry_text: "You are now the flight handler.".into(),
                system_prompt: "flights".into(),
            },
        ];
        let handlers = HandlerSet::new(descriptors, &registry).unwrap();

        let engine = ConversationEngine::new(
            handlers,
            registry,
            Arc::new(MemoryCheckpointStore::new()),
            EngineConfig::default(),
        )
        .bind_port(HandlerId::Primary, ScriptedPort::new(primary))
        .bind_port(HandlerId::UpdateFlight, ScriptedPort::new(flight));

        Fixture {
            engine,
            search_count,
            update_count,
        }
    }

    fn ctx() -> UserContext {
        UserContext::new().with("passenger_id", "3442 587242")
    }

    #[tokio::test]
    async fn plain_reply_turn() {
        let f = fixture(vec![Decision::reply("Hello! How can I help?")], vec![]);

        let outcome = f.engine.run_turn("t1", "hi", ctx()).await.unwrap();
        match outcome {
            TurnOutcome::Reply(msg) => assert_eq!(msg.text_content(), "Hello! How can I help?"),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn safe_action_executes_and_loops_back() {
        let f = fixture(
            vec![
                Decision::act(vec![ActionRequest::new(
                    ActionName::SearchFlights,
                    json!({"departure_airport": "BSL"}),
                )]),
                Decision::reply("Your flight LX0112 departs at 14:05."),
            ],
            vec![],
        );

        let outcome = f
            .engine
            .run_turn("t1", "what time is my flight?", ctx())
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Reply(msg) => assert!(msg.text_content().contains("14:05")),
            other => panic!("expected reply, got {other:?}"),
        }
        assert_eq!(f.search_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sensitive_batch_suspends_without_executing() {
        let f = fixture(
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::ToFlightBooking,
                json!({"request": "change my flight"}),
            )])],
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::UpdateTicketToNewFlight,
                json!({"ticket_no": "7240005432906569", "new_flight_id": 19238}),
            )])],
        );

        let outcome = f
            .engine
            .run_turn("t1", "change my flight", ctx())
            .await
            .unwrap();
        match outcome {
            TurnOutcome::AwaitingApproval { requests } => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].name, ActionName::UpdateTicketToNewFlight);
            }
            other => panic!("expected awaiting approval, got {other:?}"),
        }
        assert_eq!(f.update_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn approve_executes_exactly_once() {
        let f = fixture(
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::ToFlightBooking,
                json!({}),
            )])],
            vec![
                Decision::act(vec![ActionRequest::new(
                    ActionName::UpdateTicketToNewFlight,
                    json!({}),
                )]),
                Decision::reply("Done — you're on the new flight."),
            ],
        );

        f.engine.run_turn("t1", "change my flight", ctx()).await.unwrap();

        let outcome = f
            .engine
            .resume_turn("t1", ApprovalSignal::Approve)
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Reply(msg) => assert!(msg.text_content().contains("new flight")),
            other => panic!("expected reply, got {other:?}"),
        }
        assert_eq!(f.update_count.load(Ordering::SeqCst), 1);

        // replaying the same signal finds nothing pending and executes nothing
        let err = f
            .engine
            .resume_turn("t1", ApprovalSignal::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::NoPendingApproval { .. }));
        assert_eq!(f.update_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reject_feeds_feedback_without_side_effects() {
        let f = fixture(
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::ToFlightBooking,
                json!({}),
            )])],
            vec![
                Decision::act(vec![ActionRequest::new(
                    ActionName::UpdateTicketToNewFlight,
                    json!({}),
                )]),
                Decision::reply("Understood, I won't change the ticket."),
            ],
        );

        f.engine.run_turn("t1", "change my flight", ctx()).await.unwrap();

        let outcome = f
            .engine
            .resume_turn(
                "t1",
                ApprovalSignal::Reject {
                    feedback: "too expensive".into(),
                },
            )
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Reply(msg) => {
                assert!(msg.text_content().contains("won't change"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
        assert_eq!(f.update_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn escalation_returns_to_supervisor() {
        let f = fixture(
            vec![
                Decision::act(vec![ActionRequest::new(
                    ActionName::ToFlightBooking,
                    json!({}),
                )]),
                Decision::reply("Back with you — anything else?"),
            ],
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::CompleteOrEscalate,
                json!({"reason": "user changed their mind"}),
            )])],
        );

        let outcome = f
            .engine
            .run_turn("t1", "actually never mind", ctx())
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Reply(msg) => assert!(msg.text_content().contains("anything else")),
            other => panic!("expected reply, got {other:?}"),
        }

        // the stack is empty again in the persisted checkpoint
        let cp = f.engine.store.load("t1").await.unwrap().unwrap();
        assert!(cp.state.dialog_stack.is_empty());
    }

    #[tokio::test]
    async fn new_message_while_awaiting_approval_is_rejected() {
        let f = fixture(
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::ToFlightBooking,
                json!({}),
            )])],
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::UpdateTicketToNewFlight,
                json!({}),
            )])],
        );

        f.engine.run_turn("t1", "change my flight", ctx()).await.unwrap();

        let err = f
            .engine
            .run_turn("t1", "also book a hotel", ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::ApprovalPending { .. }));
    }

    #[tokio::test]
    async fn resume_unknown_thread_fails() {
        let f = fixture(vec![], vec![]);
        let err = f
            .engine
            .resume_turn("ghost", ApprovalSignal::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::ThreadNotFound { .. }));
    }

    #[tokio::test]
    async fn abort_discards_checkpoint() {
        let f = fixture(vec![Decision::reply("hello")], vec![]);
        f.engine.run_turn("t1", "hi", ctx()).await.unwrap();

        f.engine.abort_thread("t1").await.unwrap();
        assert!(f.engine.store.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn step_limit_stops_routing_livelock() {
        // primary keeps requesting the same safe action forever
        let loops: Vec<Decision> = (0..50)
            .map(|_| {
                Decision::act(vec![ActionRequest::new(ActionName::SearchFlights, json!({}))])
            })
            .collect();
        let f = fixture(loops, vec![]);

        let err = f.engine.run_turn("t1", "loop", ctx()).await.unwrap_err();
        assert!(matches!(err, ConciergeError::StepLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn unbound_port_is_a_wiring_error() {
        let f = fixture(
            vec![Decision::act(vec![ActionRequest::new(
                ActionName::ToFlightBooking,
                json!({}),
            )])],
            vec![],
        );
        // rebuild without the flight port
        let mut engine = f.engine;
        engine.ports.remove(&HandlerId::UpdateFlight);

        let err = engine
            .run_turn("t1", "change my flight", ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::UnknownHandler { .. }));
    }
}
