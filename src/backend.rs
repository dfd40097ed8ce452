//! Collaborator traits consumed by the pipeline.
//!
//! The core treats its text-generation backend and its knowledge lookups
//! as black boxes. Implementations wrap whatever transport is in play
//! (HTTP API client, local model, test stub); the pipeline only sees
//! these traits.
//!
//! Knowledge lookups are read-mostly and advisory: a failing
//! [`KnowledgeSource`] contributes zero facts to the prompt context
//! rather than failing the request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A single fact returned by a knowledge lookup, consumed when building
/// the prompt context for a backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// The fact text itself.
    pub content: String,
    /// Which source produced it (vector store, graph, etc.).
    pub source: String,
    /// Relevance score in `[0, 1]`, as reported by the source.
    pub relevance: f32,
}

/// Asynchronous text-generation backend.
///
/// The pipeline calls this only while holding a pooled handle, so a
/// correctly sized [`ResourcePool`](crate::pool::ResourcePool) bounds
/// concurrent load on the backend.
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    /// Generate a response for `prompt`, given supporting `context` facts.
    async fn generate(
        &self,
        prompt: &str,
        context: &[Fact],
    ) -> std::result::Result<String, BackendError>;
}

/// Read-mostly lookup over a knowledge store (vector index, graph, ...).
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Human-readable source name, used in logs.
    fn name(&self) -> &str;

    /// Search for facts relevant to `query`.
    async fn search(&self, query: &str) -> std::result::Result<Vec<Fact>, BackendError>;
}
