//! Request and response DTOs for the query and ingestion API.

use crate::{EvidenceSource, GraphStats, Properties, ReasoningStep};
use serde::{Deserialize, Serialize};

/// Query request: which retrieval modalities to enable and how many vector
/// hits to consider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_true")]
    pub use_vector: bool,
    #[serde(default = "default_true")]
    pub use_graph: bool,
    #[serde(default = "default_true")]
    pub use_filter: bool,
}

fn default_max_results() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl QueryRequest {
    /// Request with defaults for everything but the query text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: default_max_results(),
            use_vector: true,
            use_graph: true,
            use_filter: true,
        }
    }
}

/// Full query result: answer, evidence (at most 10), the reasoning chain, an
/// overall confidence in [0, 0.95], and wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<EvidenceSource>,
    pub reasoning_chain: Vec<ReasoningStep>,
    pub confidence: f64,
    pub query_time_ms: f64,
}

/// One event in a streamed query: each recorded reasoning step in order,
/// then the final result. Serialized untagged so the wire shape matches the
/// non-streaming payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Step(ReasoningStep),
    Result(Box<QueryResponse>),
}

/// Pre-extracted entity delivered by the ingestion pipeline. `properties`
/// must contain a `name` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEntity {
    pub label: String,
    pub properties: Properties,
}

/// Pre-extracted relationship; endpoints reference entity names within the
/// same request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRelationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: Properties,
}

/// One text chunk with its embedding; indexed as `{document_id}_chunk_{index}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Properties,
}

/// Inbound write surface of the kernel: entities, relationships, and chunk
/// embeddings produced by the (external) document pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub document_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub entities: Vec<IngestEntity>,
    #[serde(default)]
    pub relationships: Vec<IngestRelationship>,
    #[serde(default)]
    pub chunks: Vec<IngestChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub document_id: String,
    pub nodes_created: usize,
    pub relationships_created: usize,
    pub chunks_indexed: usize,
    pub graph_stats: GraphStats,
}

/// Node rendered for visualization: display label plus entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationData {
    pub nodes: Vec<VisNode>,
    pub edges: Vec<VisEdge>,
    pub stats: GraphStats,
}
