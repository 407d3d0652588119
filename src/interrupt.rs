//! Interrupt gate — human approval before sensitive execution.
//!
//! When a decision contains any sensitive action, the engine suspends the
//! thread here: the pending batch is checkpointed, the caller gets an
//! `awaiting approval` outcome, and nothing executes until a resume signal
//! arrives. Approval or rejection applies to the whole batch atomically;
//! partial approval of a multi-action batch is a known limitation carried
//! over from the source behavior.

use serde::{Deserialize, Serialize};

use crate::types::{ActionRequest, HandlerId, Message};

/// Gate lifecycle: `Running → AwaitingApproval → {Resumed, Rejected}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Running,
    AwaitingApproval,
    Resumed,
    Rejected,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateState::Running => write!(f, "running"),
            GateState::AwaitingApproval => write!(f, "awaiting_approval"),
            GateState::Resumed => write!(f, "resumed"),
            GateState::Rejected => write!(f, "rejected"),
        }
    }
}

/// External resume signal. No other signals are defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ApprovalSignal {
    /// Execute the pending batch unmodified.
    Approve,
    /// Skip execution; feed the rejection text back to the handler instead.
    Reject { feedback: String },
}

/// A sensitive batch parked at the gate, serialized into the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    pub handler: HandlerId,
    pub requests: Vec<ActionRequest>,
}

impl PendingBatch {
    pub fn new(handler: HandlerId, requests: Vec<ActionRequest>) -> Self {
        Self { handler, requests }
    }

    /// Synthesize one error-flavored action result per pending request so the
    /// handler sees the rejection as a soft failure and re-engages.
    pub fn rejection_messages(&self, feedback: &str) -> Vec<Message> {
        self.requests
            .iter()
            .map(|req| {
                Message::action_result(
                    &req.request_id,
                    format!(
                        "API call denied by user. Reasoning: '{feedback}'. \
                         Continue assisting, accounting for the user's input."
                    ),
                    true,
                )
            })
            .collect()
    }
}
