//! Conversation state — the single mutable value a thread of execution owns.
//!
//! One `ConversationState` exists per thread identifier; it is only ever
//! mutated by the handler node, router, and executor of that thread, never
//! concurrently. Everything in it serializes, so a checkpoint is just a
//! snapshot of this struct plus a resume point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{HandlerId, Message};

/// Opaque per-turn key→value context (passenger id, locale, ...).
///
/// Supplied once per turn by the caller and threaded into every action
/// invocation, so the decision port never has to produce it and one user
/// can never reach another user's records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(flatten)]
    values: BTreeMap<String, serde_json::Value>,
}

impl UserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// The signed-in passenger, used by every ticket-scoped action.
    pub fn passenger_id(&self) -> Option<&str> {
        self.get_str("passenger_id")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render as one `key: value` line per entry, for system-prompt injection.
    pub fn render(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| match v.as_str() {
                Some(s) => format!("{k}: {s}"),
                None => format!("{k}: {v}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The nested-delegation trace: which handler currently owns the conversation.
///
/// Push happens only on delegation, pop only on complete-or-escalate. An
/// empty stack means the supervisor is active; popping an empty stack stays
/// at the supervisor and is never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogStack {
    entries: Vec<HandlerId>,
}

impl DialogStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handler that owns the conversation right now.
    pub fn active(&self) -> HandlerId {
        self.entries.last().copied().unwrap_or(HandlerId::Primary)
    }

    pub fn push(&mut self, handler: HandlerId) {
        self.entries.push(handler);
    }

    /// Pop the active delegation and return the new owner.
    pub fn pop(&mut self) -> HandlerId {
        self.entries.pop();
        self.active()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Full conversation state for one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub history: Vec<Message>,
    pub dialog_stack: DialogStack,
    pub user_context: UserContext,
    /// Text of the most recent action failure, if the last batch had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_error: Option<String>,
}

impl ConversationState {
    pub fn new(user_context: UserContext) -> Self {
        Self {
            history: Vec::new(),
            dialog_stack: DialogStack::new(),
            user_context,
            pending_error: None,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.history.last()
    }
}
