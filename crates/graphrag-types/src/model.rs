//! Graph, vector, and evidence data model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Property map attached to nodes, relationships, and vector entries.
pub type Properties = HashMap<String, serde_json::Value>;

/// A graph entity instance. `id` is store-assigned, immutable, and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub properties: Properties,
}

impl Node {
    /// The `name` property, if present. Document-derived entities always carry one.
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(|v| v.as_str())
    }
}

/// A directed, typed edge between two nodes. `rel_type` is an uppercase,
/// underscore-delimited relation name (e.g. `WORKS_AT`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: Properties,
}

/// One stored embedding. `id` is either a node id (entity embedding) or a
/// synthetic chunk id of the form `{document_id}_chunk_{index}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    #[serde(default)]
    pub metadata: Properties,
}

/// A vector search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub similarity: f64,
    pub metadata: Properties,
}

/// A graph traversal hit: the node plus its hop distance from the seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphHit {
    pub node: Node,
    pub depth: usize,
}

/// Knowledge graph statistics. `attributes` is the sum of property-map sizes
/// across all nodes, an approximation rather than a true attribute count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub entities: usize,
    pub relationships: usize,
    pub attributes: usize,
    pub entity_types: HashMap<String, usize>,
}

/// Outcome of a single orchestration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Complete,
    Error,
}

/// One entry in the per-query reasoning chain. Rebuilt fresh on every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub agent: String,
    pub action: String,
    pub status: StepStatus,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

/// Which retrieval modality produced a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Vector,
    Graph,
    Filter,
}

/// One ranked, confidence-scored unit of retrieved context.
///
/// `confidence` is nominally in [0, 1]; vector evidence carries the raw
/// cosine similarity, which can dip below zero for opposing embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub content: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Properties,
}

/// Summary of one entity-resolution pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub merged_entities: usize,
    pub total_entities: usize,
    pub processing_time_ms: f64,
}

/// Durable per-document metadata, the only state the kernel persists itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    pub filename: String,
    pub uploaded_at: String,
    pub chunks: usize,
    pub entities: usize,
}
