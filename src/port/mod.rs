//! Ports to the reasoning and embedding components.
//!
//! A [`DecisionPort`] turns conversation context into either a direct reply
//! or a batch of requested actions. The engine never cares how — a scripted
//! mock in tests and the [`OpenAIDecisionPort`](openai::OpenAIDecisionPort)
//! in production satisfy the same contract. Ports must not mutate caller
//! state and should be retryable.

use async_trait::async_trait;

use crate::error::ConciergeResult;
use crate::state::UserContext;
use crate::types::{ActionRequest, Message};

mod openai;
pub use openai::{OpenAIDecisionPort, OpenAIEmbeddingPort};

/// What the reasoning component decided for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub content: Option<String>,
    pub requests: Vec<ActionRequest>,
}

impl Decision {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            requests: Vec::new(),
        }
    }

    pub fn act(requests: Vec<ActionRequest>) -> Self {
        Self {
            content: None,
            requests,
        }
    }

    /// A degenerate decision: no actions and no non-empty text. The handler
    /// node re-prompts on these rather than forwarding them.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
            && self
                .content
                .as_deref()
                .map(|c| c.trim().is_empty())
                .unwrap_or(true)
    }
}

/// Abstract reasoning boundary.
#[async_trait]
pub trait DecisionPort: Send + Sync {
    async fn decide(
        &self,
        history: &[Message],
        user_context: &UserContext,
    ) -> ConciergeResult<Decision>;
}

/// Abstract embedding boundary, consumed by the policy retriever.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Embed each text into a vector. Output order matches input order.
    async fn embed(&self, texts: &[String]) -> ConciergeResult<Vec<Vec<f32>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionName;
    use serde_json::json;

    #[test]
    fn decision_reply_is_not_empty() {
        assert!(!Decision::reply("Your flight departs at 14:05.").is_empty());
    }

    #[test]
    fn decision_with_requests_is_not_empty() {
        let d = Decision::act(vec![ActionRequest::new(
            ActionName::SearchFlights,
            json!({}),
        )]);
        assert!(!d.is_empty());
    }

    #[test]
    fn decision_blank_content_is_empty() {
        assert!(Decision::reply("").is_empty());
        assert!(Decision::reply("   ").is_empty());
        assert!(Decision {
            content: None,
            requests: vec![]
        }
        .is_empty());
    }

    #[test]
    fn decision_port_is_object_safe() {
        fn _assert_object_safe(_: &dyn DecisionPort) {}
        fn _assert_embed_object_safe(_: &dyn EmbeddingPort) {}
    }
}
