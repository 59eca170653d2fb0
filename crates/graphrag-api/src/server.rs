//! Axum server and routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use graphrag_agent::RetrievalOrchestrator;
use graphrag_resolver::EntityResolver;
use graphrag_types::{
    AgentError, DocumentMeta, DocumentRegistry, GraphStore, GraphStoreError, IngestRequest,
    IngestResponse, QueryRequest, RegistryError, ResolutionReport, VectorEntry, VectorStore,
    VectorStoreError, VisEdge, VisNode, VisualizationData,
};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub orchestrator: Arc<RetrievalOrchestrator>,
    pub graph: Arc<dyn GraphStore>,
    pub vector: Arc<dyn VectorStore>,
    pub registry: Arc<dyn DocumentRegistry>,
    pub similarity_threshold: f64,
    /// Serializes store mutation (ingest, resolve, delete, reset) against
    /// itself. Queries read concurrently; mutation racing a query is bounded
    /// by the stores' own locks.
    write_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<RetrievalOrchestrator>,
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        registry: Arc<dyn DocumentRegistry>,
        similarity_threshold: f64,
    ) -> Self {
        Self {
            orchestrator,
            graph,
            vector,
            registry,
            similarity_threshold,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/query/stream", post(handle_query_stream))
        .route("/api/ingest", post(handle_ingest))
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/:id", delete(handle_delete_document))
        .route("/api/graph/stats", get(handle_graph_stats))
        .route("/api/graph/visualize", get(handle_graph_visualize))
        .route("/api/graph/resolve", post(handle_resolve))
        .route("/api/admin/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Client-visible error with an HTTP status. Degraded paths (failed
/// sub-searches, template fallback) never reach here; this covers invalid
/// input, missing resources, and total store failure.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Timeout(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Timeout(m) => (StatusCode::GATEWAY_TIMEOUT, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::EmptyQuery => ApiError::BadRequest(e.to_string()),
            AgentError::Timeout(_) => ApiError::Timeout(e.to_string()),
        }
    }
}

impl From<GraphStoreError> for ApiError {
    fn from(e: GraphStoreError) -> Self {
        match e {
            GraphStoreError::Unavailable(_) => ApiError::Unavailable(e.to_string()),
            GraphStoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            GraphStoreError::Other(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<VectorStoreError> for ApiError {
    fn from(e: VectorStoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

async fn handle_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<graphrag_types::QueryResponse>, ApiError> {
    let response = state.orchestrator.execute_query(&req).await?;
    Ok(Json(response))
}

async fn handle_query_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.orchestrator.stream_query(&req).await?;
    let stream = events.map(|event| {
        let sse_event = match Event::default().json_data(&event) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize stream event");
                Event::default().data("{}")
            }
        };
        Ok::<_, Infallible>(sse_event)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let _guard = state.write_lock.lock().await;

    // Entities first, building a name -> id map so relationships can refer to
    // entities by name within the same request.
    let mut ids_by_name: HashMap<String, String> = HashMap::new();
    let mut nodes_created = 0;
    for entity in &req.entities {
        let mut properties = entity.properties.clone();
        properties
            .entry("document_id".to_string())
            .or_insert_with(|| json!(req.document_id));
        let id = state.graph.create_node(&entity.label, properties).await?;
        if let Some(name) = entity.properties.get("name").and_then(|v| v.as_str()) {
            ids_by_name.entry(name.to_string()).or_insert(id);
        }
        nodes_created += 1;
    }

    let mut relationships_created = 0;
    for rel in &req.relationships {
        let (Some(source), Some(target)) =
            (ids_by_name.get(&rel.source), ids_by_name.get(&rel.target))
        else {
            tracing::warn!(
                source = %rel.source,
                target = %rel.target,
                "skipping relationship with unknown endpoint name"
            );
            continue;
        };
        state
            .graph
            .create_relationship(source, target, &rel.rel_type, rel.properties.clone())
            .await?;
        relationships_created += 1;
    }

    let entries: Vec<VectorEntry> = req
        .chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut metadata = chunk.metadata.clone();
            metadata.insert("document_id".to_string(), json!(req.document_id));
            VectorEntry {
                id: format!("{}_chunk_{}", req.document_id, i),
                embedding: chunk.embedding.clone(),
                text: chunk.text.clone(),
                metadata,
            }
        })
        .collect();
    let chunks_indexed = entries.len();
    if !entries.is_empty() {
        state.vector.add(entries).await?;
    }

    state
        .registry
        .append(DocumentMeta {
            id: req.document_id.clone(),
            filename: req
                .filename
                .clone()
                .unwrap_or_else(|| req.document_id.clone()),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
            chunks: chunks_indexed,
            entities: nodes_created,
        })
        .await?;

    let graph_stats = state.graph.get_stats().await?;
    tracing::info!(
        document_id = %req.document_id,
        nodes = nodes_created,
        relationships = relationships_created,
        chunks = chunks_indexed,
        "document ingested"
    );
    Ok(Json(IngestResponse {
        document_id: req.document_id,
        nodes_created,
        relationships_created,
        chunks_indexed,
        graph_stats,
    }))
}

async fn handle_list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DocumentMeta>>, ApiError> {
    Ok(Json(state.registry.list().await?))
}

async fn handle_delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _guard = state.write_lock.lock().await;

    let Some(doc) = state.registry.remove(&id).await? else {
        return Err(ApiError::NotFound(format!("document not found: {id}")));
    };
    let chunks_removed = state
        .vector
        .remove_by_prefix(&format!("{id}_chunk_"))
        .await?;
    let nodes_removed = state
        .graph
        .remove_nodes_by_property("document_id", &json!(id))
        .await?;
    tracing::info!(
        document_id = %id,
        chunks_removed,
        nodes_removed,
        "document deleted"
    );
    Ok(Json(json!({
        "id": doc.id,
        "chunks_removed": chunks_removed,
        "nodes_removed": nodes_removed,
    })))
}

async fn handle_graph_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<graphrag_types::GraphStats>, ApiError> {
    Ok(Json(state.graph.get_stats().await?))
}

/// Cap on nodes and edges returned for visualization; large graphs are
/// sampled rather than serialized whole.
const VIS_LIMIT: usize = 100;

async fn handle_graph_visualize(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VisualizationData>, ApiError> {
    let nodes = state.graph.all_nodes().await?;
    let relationships = state.graph.all_relationships().await?;
    let stats = state.graph.get_stats().await?;

    let vis_nodes = nodes
        .iter()
        .take(VIS_LIMIT)
        .map(|n| VisNode {
            id: n.id.clone(),
            label: n.name().unwrap_or(&n.label).to_string(),
            node_type: n.label.clone(),
        })
        .collect();
    let vis_edges = relationships
        .iter()
        .take(VIS_LIMIT)
        .map(|r| VisEdge {
            from: r.source.clone(),
            to: r.target.clone(),
            label: r.rel_type.clone(),
        })
        .collect();
    Ok(Json(VisualizationData {
        nodes: vis_nodes,
        edges: vis_edges,
        stats,
    }))
}

async fn handle_resolve(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResolutionReport>, ApiError> {
    let _guard = state.write_lock.lock().await;
    let resolver = EntityResolver::new(Arc::clone(&state.graph), state.similarity_threshold);
    Ok(Json(resolver.resolve_entities().await?))
}

async fn handle_reset(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _guard = state.write_lock.lock().await;
    state.graph.reset().await?;
    state.vector.clear().await?;
    for doc in state.registry.list().await? {
        state.registry.remove(&doc.id).await?;
    }
    tracing::info!("stores reset");
    Ok(Json(json!({ "status": "reset" })))
}

async fn handle_health() -> &'static str {
    "ok"
}
