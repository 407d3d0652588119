//! Company policy lookup, backed by the embedding retriever.
//!
//! The supervisor is instructed to consult this before permitting any
//! booking change, so the answer includes the matched policy sections
//! verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::ConciergeResult;
use crate::registry::{Action, ActionSchema};
use crate::retrieval::PolicyRetriever;
use crate::state::UserContext;
use crate::types::{ActionName, Classification};

#[derive(Debug, Deserialize)]
struct LookupPolicyArgs {
    query: String,
}

pub struct LookupPolicyAction {
    retriever: Arc<PolicyRetriever>,
}

impl LookupPolicyAction {
    pub fn new(retriever: Arc<PolicyRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Action for LookupPolicyAction {
    fn name(&self) -> ActionName {
        ActionName::LookupPolicy
    }

    fn classification(&self) -> Classification {
        Classification::Safe
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Consult the company policies to check whether certain options are \
                permitted. Use this before making any flight changes or performing other \
                'write' events."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: LookupPolicyArgs = serde_json::from_value(arguments)?;
        let sections = self.retriever.query(&args.query).await?;
        if sections.is_empty() {
            return Ok("No matching policy sections found.".into());
        }
        Ok(sections
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
