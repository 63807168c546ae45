//! Embedding and completion client contracts (§6.3). Both are deliberately
//! single-method interfaces so implementations can be thin wrappers over
//! any transport: synchronous thread pools, async HTTP clients, or local
//! models (§9).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type LlmResult<T> = anyhow::Result<T>;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Deterministic for identical input; implementations are free to
    /// cache.
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedAttributeCandidate {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub weight: Option<f32>,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Rewrites `query` for disambiguation only; must not introduce facts
    /// absent from the query (§4.3 step 1). `background` is optional
    /// free-text context. Returns `None` when the call itself fails, in
    /// which case the caller falls back to the original query.
    async fn rewrite_query(&self, query: &str, background: Option<&str>) -> LlmResult<Option<String>>;

    /// Extracts structured attribute hints restricted to `allowed_types`
    /// (§4.3 step 3). Returns an empty vec on malformed/empty output
    /// rather than erroring; the caller treats that the same as "no
    /// attributes", not as a transport failure.
    async fn extract_attributes(
        &self,
        query: &str,
        allowed_types: &[String],
    ) -> LlmResult<Vec<ExtractedAttributeCandidate>>;
}
