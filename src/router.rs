//! Conditional-edge logic — pure routing over the last decision.
//!
//! Five rules, evaluated in fixed order; exactly one matches per decision:
//!
//! 1. no actions → end the turn
//! 2. any `CompleteOrEscalate` → pop the dialog stack
//! 3. supervisor + leading delegation marker → push that handler
//! 4. every action in the active handler's safe subset → safe execution
//! 5. otherwise → sensitive execution (through the interrupt gate)
//!
//! A delegation marker outside the supervisor is a wiring bug, surfaced as
//! `UnknownHandler` rather than silently falling into rule 5.

use crate::error::{ConciergeError, ConciergeResult};
use crate::port::Decision;
use crate::registry::CapabilitySet;
use crate::types::{ActionName, HandlerId};

/// Where the engine goes next after a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextNode {
    /// Yield control to the caller; the reply is the last assistant message.
    EndTurn,
    /// Pop the dialog stack and hand control back toward the supervisor.
    PopDialog,
    /// Push the named handler and hand the conversation to it.
    Delegate(HandlerId),
    /// Execute the whole batch immediately.
    SafeActions(HandlerId),
    /// Suspend at the interrupt gate before executing.
    SensitiveActions(HandlerId),
}

/// Map (decision, active handler, its capability set) to the next node.
pub fn route(
    decision: &Decision,
    active: HandlerId,
    capabilities: &CapabilitySet,
) -> ConciergeResult<NextNode> {
    // rule 1: a plain reply ends the turn
    if decision.requests.is_empty() {
        return Ok(NextNode::EndTurn);
    }

    // rule 2: escalation wins over everything else in the batch
    if decision
        .requests
        .iter()
        .any(|r| r.name == ActionName::CompleteOrEscalate)
    {
        return Ok(NextNode::PopDialog);
    }

    // rule 3: delegation, only ever valid at the supervisor
    let first = &decision.requests[0];
    if let Some(target) = first.name.delegation_target() {
        if active == HandlerId::Primary {
            return Ok(NextNode::Delegate(target));
        }
        return Err(ConciergeError::UnknownHandler {
            name: format!("{} requested delegation to {target}", active),
        });
    }
    // a delegation marker buried deeper in the batch is equally a defect
    if let Some(stray) = decision
        .requests
        .iter()
        .find_map(|r| r.name.delegation_target())
    {
        return Err(ConciergeError::UnknownHandler {
            name: format!("delegation to {stray} must be the first requested action"),
        });
    }

    // rules 4 & 5: classification of the batch
    if capabilities.all_safe(&decision.requests) {
        Ok(NextNode::SafeActions(active))
    } else {
        Ok(NextNode::SensitiveActions(active))
    }
}
