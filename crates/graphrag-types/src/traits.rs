//! Traits for store backends and model collaborators.

use crate::{
    DocumentMeta, GraphHit, GraphStats, Node, Properties, Relationship, VectorEntry, VectorHit,
};
use async_trait::async_trait;

/// Graph store abstraction. Every backend implements the full surface,
/// including traversal and filter search; callers never special-case variants.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a node; returns the store-assigned id.
    async fn create_node(
        &self,
        label: &str,
        properties: Properties,
    ) -> Result<String, GraphStoreError>;

    /// Create a directed relationship. Endpoint existence is not validated;
    /// upstream producers may race, and a dangling reference must not break
    /// later reads.
    async fn create_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        rel_type: &str,
        properties: Properties,
    ) -> Result<String, GraphStoreError>;

    /// Execute a backend-specific query. The in-memory variant supports only
    /// the "all nodes" and "all relationships" patterns and returns an empty
    /// record list for anything else.
    async fn execute_query(
        &self,
        query: &str,
        params: Option<&Properties>,
    ) -> Result<Vec<serde_json::Value>, GraphStoreError>;

    async fn get_stats(&self) -> Result<GraphStats, GraphStoreError>;

    /// Clear all nodes, relationships, and id counters. Irreversible.
    async fn reset(&self) -> Result<(), GraphStoreError>;

    /// Bounded-depth BFS from the first node whose `name` property contains
    /// `entity` (case-insensitive). Expands over both edge directions, visits
    /// each node at most once; `depth` is inclusive. No match yields an empty
    /// result, not an error.
    async fn search_by_graph(
        &self,
        entity: &str,
        depth: usize,
    ) -> Result<Vec<GraphHit>, GraphStoreError>;

    /// Nodes whose properties exactly match every filter entry.
    async fn search_by_filter(&self, filters: &Properties) -> Result<Vec<Node>, GraphStoreError>;

    /// All nodes in store iteration order (insertion order for the in-memory
    /// variant). Used by the entity resolver.
    async fn all_nodes(&self) -> Result<Vec<Node>, GraphStoreError>;

    /// All relationships in store iteration order.
    async fn all_relationships(&self) -> Result<Vec<Relationship>, GraphStoreError>;

    /// Replace the property map of an existing node.
    async fn set_node_properties(
        &self,
        id: &str,
        properties: Properties,
    ) -> Result<(), GraphStoreError>;

    /// Remove a node. Its id is never reused.
    async fn remove_node(&self, id: &str) -> Result<(), GraphStoreError>;

    /// Rewrite every relationship endpoint referencing `old_id` to `new_id`;
    /// returns the number of relationships touched.
    async fn redirect_relationships(
        &self,
        old_id: &str,
        new_id: &str,
    ) -> Result<usize, GraphStoreError>;

    /// Remove all nodes whose `key` property equals `value`, along with
    /// relationships referencing them; returns the number of nodes removed.
    async fn remove_nodes_by_property(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<usize, GraphStoreError>;
}

/// Vector store abstraction: id -> (embedding, source text, metadata).
/// All embeddings in one store must share a fixed dimensionality; searches
/// against an entry of a different dimension fail with `DimensionMismatch`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace entries by id.
    async fn add(&self, entries: Vec<VectorEntry>) -> Result<(), VectorStoreError>;

    /// Brute-force cosine similarity over every stored entry, sorted
    /// descending, top `k`. Ties break by store iteration order.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorStoreError>;

    /// Remove all entries whose id starts with `prefix` (used to drop a
    /// document's chunks); returns the number removed.
    async fn remove_by_prefix(&self, prefix: &str) -> Result<usize, VectorStoreError>;

    async fn count(&self) -> Result<usize, VectorStoreError>;

    async fn clear(&self) -> Result<(), VectorStoreError>;
}

/// Embedder: text -> vector. Fixed dimensionality per instance.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text. Default implementation uses embed_batch.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let v = self.embed_batch(&[text.to_string()]).await?;
        v.into_iter().next().ok_or(EmbedderError::EmptyResponse)
    }

    /// Embed multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError>;
}

/// Text-generation collaborator used only for answer synthesis. The
/// orchestrator must keep working via template fallback when this is absent
/// or failing.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// Durable registry of resolved document metadata (append-on-ingest,
/// remove-on-delete).
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    async fn append(&self, doc: DocumentMeta) -> Result<(), RegistryError>;

    async fn list(&self) -> Result<Vec<DocumentMeta>, RegistryError>;

    /// Remove one document entry; returns the entry if it existed.
    async fn remove(&self, id: &str) -> Result<Option<DocumentMeta>, RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GraphStoreError {
    #[error("graph store unavailable: {0}")]
    Unavailable(String),
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("graph store error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("embedding dimension mismatch: query has {query} dimensions, entry {entry_id} has {stored}")]
    DimensionMismatch {
        query: usize,
        stored: usize,
        entry_id: String,
    },
    #[error("vector store error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("embedder error: {0}")]
    Other(String),
    #[error("empty response")]
    EmptyResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),
    #[error("generator error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("document registry error: {0}")]
    Other(String),
}

/// Orchestrator-level failures. Sub-search errors are isolated per branch and
/// never surface here; only invalid input and a blown timeout do.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("query timed out after {0} ms")]
    Timeout(u64),
}
