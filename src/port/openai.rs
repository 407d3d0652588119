//! OpenAI-backed ports: chat completions for decisions, the embeddings
//! endpoint for the policy retriever.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;

use crate::error::{ConciergeError, ConciergeResult};
use crate::port::{Decision, DecisionPort, EmbeddingPort};
use crate::registry::ActionSchema;
use crate::state::UserContext;
use crate::types::{ActionName, ActionRequest, ContentBlock, Message, Role};

/// Decision port for one handler: carries that handler's system prompt and
/// the schemas of every action it may request.
pub struct OpenAIDecisionPort {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    schemas: Vec<ActionSchema>,
}

impl OpenAIDecisionPort {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        schemas: Vec<ActionSchema>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: "https://api.openai.com".into(),
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            schemas,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn render_system(&self, user_context: &UserContext) -> String {
        format!(
            "{}\n\nCurrent user information:\n{}\n\nCurrent time: {}.",
            self.system_prompt,
            user_context.render(),
            Utc::now().to_rfc3339(),
        )
    }

    fn build_body(&self, history: &[Message], user_context: &UserContext) -> serde_json::Value {
        let mut api_messages = vec![json!({
            "role": "system",
            "content": self.render_system(user_context),
        })];

        for msg in history {
            api_messages.push(self.message_to_api(msg));
        }

        let mut body = json!({
            "model": self.model,
            "messages": api_messages,
        });

        if !self.schemas.is_empty() {
            let api_tools: Vec<serde_json::Value> = self
                .schemas
                .iter()
                .map(|s| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": s.name.as_str(),
                            "description": s.description,
                            "parameters": s.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(api_tools);
        }

        body
    }

    fn message_to_api(&self, msg: &Message) -> serde_json::Value {
        match msg.role {
            Role::Assistant => {
                let mut result = json!({"role": "assistant"});
                let mut content_text = String::new();
                let mut tool_calls: Vec<serde_json::Value> = Vec::new();

                for block in &msg.content {
                    match block {
                        ContentBlock::Text { text } => content_text.push_str(text),
                        ContentBlock::ActionCall {
                            id,
                            name,
                            arguments,
                        } => {
                            tool_calls.push(json!({
                                "id": id,
                                "type": "function",
                                "function": {
                                    "name": name.as_str(),
                                    "arguments": arguments.to_string(),
                                }
                            }));
                        }
                        _ => {}
                    }
                }

                if !content_text.is_empty() {
                    result["content"] = json!(content_text);
                }
                if !tool_calls.is_empty() {
                    result["tool_calls"] = json!(tool_calls);
                }
                result
            }
            Role::Tool => {
                let block = msg.content.first();
                if let Some(ContentBlock::ActionResult {
                    action_call_id,
                    content,
                    ..
                }) = block
                {
                    json!({
                        "role": "tool",
                        "tool_call_id": action_call_id,
                        "content": content,
                    })
                } else {
                    json!({"role": "user", "content": msg.text_content()})
                }
            }
            Role::User => json!({"role": "user", "content": msg.text_content()}),
            Role::System => json!({"role": "system", "content": msg.text_content()}),
        }
    }

    fn parse_decision(&self, body: &serde_json::Value) -> ConciergeResult<Decision> {
        let message = body
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ConciergeError::Port("response has no choices".into()))?;

        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let mut requests = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
            for call in calls {
                let id = call
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let func = call
                    .get("function")
                    .ok_or_else(|| ConciergeError::Port("tool call without function".into()))?;
                let raw_name = func.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                let name = ActionName::parse(raw_name).ok_or_else(|| {
                    ConciergeError::UnknownAction {
                        name: raw_name.to_string(),
                    }
                })?;
                let arguments = func
                    .get("arguments")
                    .and_then(|v| v.as_str())
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| json!({}));
                requests.push(ActionRequest::with_id(id, name, arguments));
            }
        }

        Ok(Decision { content, requests })
    }
}

#[async_trait]
impl DecisionPort for OpenAIDecisionPort {
    async fn decide(
        &self,
        history: &[Message],
        user_context: &UserContext,
    ) -> ConciergeResult<Decision> {
        let body = self.build_body(history, user_context);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConciergeError::Port(format!(
                "OpenAI API error {status}: {body}"
            )));
        }

        let parsed: serde_json::Value = response.json().await?;
        self.parse_decision(&parsed)
    }
}

// ─── Embeddings ─────────────────────────────────────────────────────────────

pub struct OpenAIEmbeddingPort {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIEmbeddingPort {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: "https://api.openai.com".into(),
            api_key: api_key.into(),
            model: "text-embedding-3-small".into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_embeddings(body: &serde_json::Value, expected: usize) -> ConciergeResult<Vec<Vec<f32>>> {
        let data = body
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ConciergeError::Port("embeddings response has no data".into()))?;

        let mut vectors = vec![Vec::new(); expected];
        for entry in data {
            let index = entry.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            let embedding = entry
                .get("embedding")
                .and_then(|v| v.as_array())
                .ok_or_else(|| ConciergeError::Port("entry has no embedding".into()))?
                .iter()
                .filter_map(|v| v.as_f64())
                .map(|f| f as f32)
                .collect();
            if index >= vectors.len() {
                return Err(ConciergeError::Port(format!(
                    "embedding index {index} out of range"
                )));
            }
            vectors[index] = embedding;
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingPort for OpenAIEmbeddingPort {
    async fn embed(&self, texts: &[String]) -> ConciergeResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConciergeError::Port(format!(
                "OpenAI API error {status}: {body}"
            )));
        }

        let parsed: serde_json::Value = response.json().await?;
        Self::parse_embeddings(&parsed, texts.len())
    }
}
