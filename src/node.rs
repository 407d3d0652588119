//! Handler node — one decision-port invocation with bounded re-prompting.
//!
//! The decision port may legitimately come back with nothing: no actions and
//! no text. That is recoverable, not fatal — the node appends a synthetic
//! "respond with a real output" nudge and retries, up to a configurable
//! ceiling. Only at the ceiling does it fail with `EmptyDecision`.

use std::sync::Arc;

use crate::error::{ConciergeError, ConciergeResult};
use crate::port::{Decision, DecisionPort};
use crate::state::ConversationState;
use crate::types::{HandlerId, Message};

/// Nudge injected when the port returns a degenerate answer. The nudge only
/// lives in the scratch history for the retry; it is never persisted.
const REPROMPT_TEXT: &str = "Respond with a real output.";

pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Wraps a decision port bound to one handler.
pub struct HandlerNode {
    id: HandlerId,
    port: Arc<dyn DecisionPort>,
    max_retries: usize,
}

impl HandlerNode {
    pub fn new(id: HandlerId, port: Arc<dyn DecisionPort>) -> Self {
        Self {
            id,
            port,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Invoke the port until it yields a usable decision or the retry
    /// ceiling is hit.
    pub async fn run(&self, state: &ConversationState) -> ConciergeResult<Decision> {
        let mut scratch: Vec<Message> = state.history.clone();

        for _ in 0..=self.max_retries {
            let decision = self.port.decide(&scratch, &state.user_context).await?;
            if !decision.is_empty() {
                return Ok(decision);
            }
            scratch.push(Message::user(REPROMPT_TEXT));
        }

        Err(ConciergeError::EmptyDecision {
            retries: self.max_retries,
        })
    }
}
