//! Action executor — runs a batch and turns every outcome into history.
//!
//! One action-result message per request, in request order. Failures are
//! captured as error text fed back to the handler for self-correction; they
//! never abort the siblings in the batch and never kill the thread. A
//! missing registration is itself an error result, not a crash.

use std::sync::Arc;

use crate::registry::ActionRegistry;
use crate::state::UserContext;
use crate::types::{ActionRequest, Message};

pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
}

impl ActionExecutor {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    /// Execute every request in the batch, yielding one result message per
    /// request in the same order.
    pub async fn execute(
        &self,
        batch: &[ActionRequest],
        user_context: &UserContext,
    ) -> Vec<Message> {
        let mut results = Vec::with_capacity(batch.len());

        for request in batch {
            let message = match self.registry.get(request.name) {
                Some(action) => {
                    match action
                        .invoke(request.arguments.clone(), user_context)
                        .await
                    {
                        Ok(content) => {
                            Message::action_result(&request.request_id, content, false)
                        }
                        Err(e) => Message::action_result(
                            &request.request_id,
                            format!("Error: {e}\nPlease fix your mistakes."),
                            true,
                        ),
                    }
                }
                None => Message::action_result(
                    &request.request_id,
                    format!(
                        "Error: action '{}' is not available.\nPlease fix your mistakes.",
                        request.name
                    ),
                    true,
                ),
            };
            results.push(message);
        }

        results
    }
}

/// The error text of the last failing result in a batch, if any.
/// Stored on the conversation state as `pending_error`.
pub fn last_error_text(results: &[Message]) -> Option<String> {
    results
        .iter()
        .rev()
        .find_map(|m| match m.content.first() {
            Some(crate::types::ContentBlock::ActionResult {
                content,
                is_error: true,
                ..
            }) => Some(content.clone()),
            _ => None,
        })
}
