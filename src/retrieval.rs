//! Policy retrieval — embedding search over the company policy document.
//!
//! The document is split at `##` headings, each section embedded once at
//! build time. A query embeds the question and ranks sections by dot
//! product; embeddings from the OpenAI endpoint are unit-normalized, so dot
//! product is cosine similarity.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConciergeResult;
use crate::port::EmbeddingPort;

pub const DEFAULT_TOP_K: usize = 2;

/// One policy section with its query-relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSection {
    pub text: String,
    pub score: f32,
}

/// Split a markdown policy document into sections at `## ` headings.
/// The preamble before the first heading is its own section.
pub fn split_sections(document: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in document.lines() {
        if line.starts_with("## ") && !current.trim().is_empty() {
            sections.push(current.trim().to_string());
            current = String::new();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current.trim().to_string());
    }
    sections
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub struct PolicyRetriever {
    port: Arc<dyn EmbeddingPort>,
    sections: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    top_k: usize,
}

impl PolicyRetriever {
    /// Index a policy document: split into sections and embed each one.
    pub async fn build(
        document: &str,
        port: Arc<dyn EmbeddingPort>,
        top_k: usize,
    ) -> ConciergeResult<Self> {
        let sections = split_sections(document);
        let embeddings = port.embed(&sections).await?;
        Ok(Self {
            port,
            sections,
            embeddings,
            top_k,
        })
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// The `top_k` sections most relevant to the query, best first.
    pub async fn query(&self, question: &str) -> ConciergeResult<Vec<ScoredSection>> {
        if self.sections.is_empty() {
            return Ok(Vec::new());
        }

        let query_vectors = self.port.embed(&[question.to_string()]).await?;
        let query = match query_vectors.first() {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };

        let mut scored: Vec<ScoredSection> = self
            .sections
            .iter()
            .zip(&self.embeddings)
            .map(|(text, emb)| ScoredSection {
                text: text.clone(),
                score: dot(query, emb),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);
        Ok(scored)
    }
}
