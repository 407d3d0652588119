//! # concierge-core
//!
//! Dialog-routing engine for a travel customer-support agent — a supervisor
//! plus four specialized handlers (flight changes, hotels, car rentals,
//! excursions) with human approval gating for every booking mutation and
//! resumable per-thread checkpoints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use concierge_core::checkpoint::MemoryCheckpointStore;
//! use concierge_core::engine::{ConversationEngine, EngineConfig, TurnOutcome};
//! use concierge_core::interrupt::ApprovalSignal;
//! use concierge_core::port::{OpenAIDecisionPort, OpenAIEmbeddingPort};
//! use concierge_core::registry::{ActionRegistry, HandlerSet};
//! use concierge_core::retrieval::{PolicyRetriever, DEFAULT_TOP_K};
//! use concierge_core::state::UserContext;
//! use concierge_core::store::MemoryTravelStore;
//!
//! # async fn run() -> concierge_core::ConciergeResult<()> {
//! let store = Arc::new(MemoryTravelStore::new());
//! let embedder = Arc::new(OpenAIEmbeddingPort::new("sk-..."));
//! let retriever = Arc::new(
//!     PolicyRetriever::build("## Cancellation\n...", embedder, DEFAULT_TOP_K).await?,
//! );
//!
//! let mut registry = ActionRegistry::new();
//! concierge_core::actions::register_travel_actions(&mut registry, store, retriever)?;
//! let registry = Arc::new(registry);
//!
//! let descriptors = HandlerSet::travel_descriptors();
//! let handlers = HandlerSet::new(descriptors.clone(), &registry)?;
//!
//! let mut engine = ConversationEngine::new(
//!     handlers,
//!     registry.clone(),
//!     Arc::new(MemoryCheckpointStore::new()),
//!     EngineConfig::default(),
//! );
//! for desc in &descriptors {
//!     let schemas = registry.schemas_for(&desc.capabilities.all_names());
//!     let port = OpenAIDecisionPort::new("sk-...", "gpt-4o", &desc.system_prompt, schemas);
//!     engine = engine.bind_port(desc.id, Arc::new(port));
//! }
//!
//! let ctx = UserContext::new().with("passenger_id", "3442 587242");
//! match engine.run_turn("thread-1", "Move me to a later flight", ctx).await? {
//!     TurnOutcome::Reply(msg) => println!("{}", msg.text_content()),
//!     TurnOutcome::AwaitingApproval { requests } => {
//!         // show `requests` to a human, then:
//!         engine.resume_turn("thread-1", ApprovalSignal::Approve).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Core types: `HandlerId`, `ActionName`, `Message`, `ContentBlock` |
//! | [`state`] | Per-thread conversation state: history, dialog stack, user context |
//! | [`port`] | Decision and embedding port traits plus the OpenAI-backed implementations |
//! | [`registry`] | Action catalogue with safe/sensitive classification and handler capability sets |
//! | [`node`] | Handler node: one decision per step, bounded re-prompt on empty output |
//! | [`router`] | The five ordered routing rules over a decision |
//! | [`executor`] | Batch action execution, one result message per request |
//! | [`interrupt`] | Approval gate: pending batches, approve/reject signals |
//! | [`checkpoint`] | Durable per-thread snapshots (filesystem and in-memory stores) |
//! | [`engine`] | Thread API: `run_turn`, `resume_turn`, `abort_thread` |
//! | [`actions`] | Concrete travel actions (flights, hotels, car rentals, excursions, policy) |
//! | [`store`] | Travel data boundary with an in-memory reference implementation |
//! | [`retrieval`] | Embedding search over the company policy document |
//! | [`eventlog`] | Structured logging of routing, gate, and checkpoint events |
//! | [`error`] | Error types with thiserror: `ConciergeError`, `ConciergeResult` |

pub mod actions;
pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod eventlog;
pub mod executor;
pub mod interrupt;
pub mod node;
pub mod port;
pub mod registry;
pub mod retrieval;
pub mod router;
pub mod state;
pub mod store;
pub mod types;

pub use error::{ConciergeError, ConciergeResult};
pub use types::*;
