//! Agentic retrieval orchestration.
//!
//! One query fans out to vector, graph, and filter sub-searches running
//! concurrently, waits for all of them to settle, synthesizes the survivors
//! into ranked evidence, scores an overall confidence, and assembles an
//! answer. Sub-search failures are isolated per branch: a failed branch is
//! marked in the reasoning chain and dropped from synthesis, never failing
//! the query. The reasoning chain and result set are rebuilt fresh on every
//! call; nothing leaks across queries.

mod analysis;
mod answer;

pub use analysis::{analyze_query, QueryAnalysis, QueryIntent};

use graphrag_types::{
    AgentError, AnswerGenerator, Embedder, EvidenceSource, GraphHit, GraphStore, Node, Properties,
    QueryRequest, QueryResponse, ReasoningStep, Settings, SourceType, StepStatus, StreamEvent,
    VectorHit, VectorStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_stream::wrappers::ReceiverStream;

const COORDINATOR: &str = "Coordinator Agent";
const VECTOR_AGENT: &str = "Vector Search Agent";
const GRAPH_AGENT: &str = "Graph Traversal Agent";
const FILTER_AGENT: &str = "Filter Agent";
const SYNTHESIS_AGENT: &str = "Synthesis Agent";

const VECTOR_SLICE: usize = 5;
const GRAPH_SLICE: usize = 5;
const FILTER_SLICE: usize = 3;
const MAX_SOURCES: usize = 10;
const GRAPH_CONFIDENCE_FLOOR: f64 = 0.3;
const FILTER_CONFIDENCE: f64 = 0.9;
const CONFIDENCE_CAP: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Inclusive BFS depth for graph sub-searches.
    pub graph_depth: usize,
    /// Dimension of the placeholder query vector used when embedding fails.
    pub placeholder_dimension: usize,
    /// Whole-query budget; covers analysis, all sub-searches, and synthesis.
    pub query_timeout: Duration,
    /// Pacing delay between streamed reasoning steps.
    pub stream_step_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            graph_depth: 2,
            placeholder_dimension: 384,
            query_timeout: Duration::from_secs(30),
            stream_step_delay: Duration::from_millis(200),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            graph_depth: settings.graph_traversal_depth,
            placeholder_dimension: settings.embedding_dimension,
            query_timeout: Duration::from_secs(settings.retrieval_timeout_secs),
            stream_step_delay: Duration::from_millis(settings.stream_step_delay_ms),
        }
    }
}

/// The orchestrator. Stores are shared by reference; the answer generator is
/// optional and the orchestrator works fully (via templates) without it.
pub struct RetrievalOrchestrator {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    config: OrchestratorConfig,
}

impl RetrievalOrchestrator {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            graph,
            vector,
            embedder,
            generator: None,
            config,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Execute one query under the configured timeout. Fails only on invalid
    /// input or a blown budget; sub-search failures degrade the result
    /// instead.
    pub async fn execute_query(&self, request: &QueryRequest) -> Result<QueryResponse, AgentError> {
        if request.query.trim().is_empty() {
            return Err(AgentError::EmptyQuery);
        }
        let budget = self.config.query_timeout;
        match tokio::time::timeout(budget, self.run_query(request)).await {
            Ok(response) => Ok(response),
            Err(_) => {
                tracing::warn!(query = %request.query, budget_ms = budget.as_millis() as u64, "query timed out");
                Err(AgentError::Timeout(budget.as_millis() as u64))
            }
        }
    }

    /// Execute one query and stream its reasoning steps one at a time, paced
    /// by the configured delay, followed by the final result. The query runs
    /// exactly once; the stream replays the recorded chain.
    pub async fn stream_query(
        &self,
        request: &QueryRequest,
    ) -> Result<ReceiverStream<StreamEvent>, AgentError> {
        let response = self.execute_query(request).await?;
        let delay = self.config.stream_step_delay;
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for step in response.reasoning_chain.clone() {
                if tx.send(StreamEvent::Step(step)).await.is_err() {
                    return;
                }
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(StreamEvent::Result(Box::new(response))).await;
        });
        Ok(ReceiverStream::new(rx))
    }

    async fn run_query(&self, request: &QueryRequest) -> QueryResponse {
        let started = Instant::now();
        let mut chain: Vec<ReasoningStep> = Vec::new();

        push_step(
            &mut chain,
            COORDINATOR,
            "Analyzing query complexity and determining retrieval strategy",
        );
        let analysis = analyze_query(&request.query);

        // Fan-out: steps are recorded at dispatch time so the chain stays in
        // coordinator -> sub-agents -> synthesis order no matter how the
        // branches finish.
        let vector_task = if request.use_vector {
            let idx = push_step(
                &mut chain,
                VECTOR_AGENT,
                "Finding semantically similar content using embeddings",
            );
            Some((idx, self.spawn_vector_search(request)))
        } else {
            None
        };

        let graph_task = if request.use_graph {
            let idx = push_step(
                &mut chain,
                GRAPH_AGENT,
                "Exploring relationship paths in knowledge graph",
            );
            Some((idx, self.spawn_graph_search(request, &analysis)))
        } else {
            None
        };

        let filter_task = if request.use_filter && !analysis.filters.is_empty() {
            let rendered = serde_json::to_string(&analysis.filters).unwrap_or_default();
            let idx = push_step(
                &mut chain,
                FILTER_AGENT,
                format!("Applying metadata constraints: {rendered}"),
            );
            Some((idx, self.spawn_filter_search(&analysis)))
        } else {
            None
        };

        // Fan-in: every branch settles (success or failure) before synthesis.
        let mut vector_hits = None;
        if let Some((idx, handle)) = vector_task {
            vector_hits = settle(handle.join().await, &mut chain, idx, "vector");
        }
        let mut graph_hits = None;
        if let Some((idx, handle)) = graph_task {
            graph_hits = settle(handle.join().await, &mut chain, idx, "graph");
        }
        let mut filter_hits = None;
        if let Some((idx, handle)) = filter_task {
            filter_hits = settle(handle.join().await, &mut chain, idx, "filter");
        }

        push_step(
            &mut chain,
            SYNTHESIS_AGENT,
            "Ranking and merging results from all sources",
        );
        let (sources, context) = synthesize(vector_hits, graph_hits, filter_hits);
        let answer = answer::generate_answer(
            self.generator.as_deref(),
            &request.query,
            &context,
            &sources,
        )
        .await;
        let confidence = calculate_confidence(&sources);

        QueryResponse {
            answer,
            sources,
            reasoning_chain: chain,
            confidence,
            query_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn spawn_vector_search(&self, request: &QueryRequest) -> SubSearch<Vec<VectorHit>> {
        let embedder = Arc::clone(&self.embedder);
        let store = Arc::clone(&self.vector);
        let query = request.query.clone();
        let k = request.max_results;
        let placeholder_dimension = self.config.placeholder_dimension;
        SubSearch(tokio::spawn(async move {
            // Degraded mode: an unavailable embedder substitutes a fixed
            // placeholder vector instead of failing the branch. Relevance is
            // sacrificed, liveness is not.
            let embedding = match embedder.embed(&query).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "embedding unavailable, using placeholder vector");
                    vec![0.1; placeholder_dimension]
                }
            };
            store.search(&embedding, k).await.map_err(|e| e.to_string())
        }))
    }

    fn spawn_graph_search(
        &self,
        request: &QueryRequest,
        analysis: &QueryAnalysis,
    ) -> SubSearch<Vec<GraphHit>> {
        let store = Arc::clone(&self.graph);
        let entities = analysis.entities.clone();
        let query = request.query.clone();
        let depth = self.config.graph_depth;
        SubSearch(tokio::spawn(async move {
            let mut hits = Vec::new();
            for entity in &entities {
                hits.extend(
                    store
                        .search_by_graph(entity, depth)
                        .await
                        .map_err(|e| e.to_string())?,
                );
            }
            // No entity produced anything: fall back to capitalized words
            // longer than 3 characters.
            if hits.is_empty() {
                for word in query.split_whitespace() {
                    if word.len() > 3 && word.chars().next().is_some_and(|c| c.is_uppercase()) {
                        hits.extend(
                            store
                                .search_by_graph(word, depth)
                                .await
                                .map_err(|e| e.to_string())?,
                        );
                    }
                }
            }
            Ok(hits)
        }))
    }

    fn spawn_filter_search(&self, analysis: &QueryAnalysis) -> SubSearch<Vec<Node>> {
        let store = Arc::clone(&self.graph);
        let filters = analysis.filters.clone();
        SubSearch(tokio::spawn(async move {
            store.search_by_filter(&filters).await.map_err(|e| e.to_string())
        }))
    }
}

/// Sub-search task handle that aborts the task when dropped. A blown query
/// budget drops `run_query` mid-join, which cancels every in-flight branch
/// instead of leaving it running detached.
struct SubSearch<T>(JoinHandle<Result<T, String>>);

impl<T> SubSearch<T> {
    async fn join(mut self) -> Result<Result<T, String>, JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for SubSearch<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Join one settled branch. Failures (including task panics) are logged,
/// flip the branch's reasoning step to `error`, and yield `None`.
fn settle<T>(
    joined: Result<Result<T, String>, JoinError>,
    chain: &mut [ReasoningStep],
    step_idx: usize,
    branch: &str,
) -> Option<T> {
    let error = match joined {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => e,
        Err(e) => e.to_string(),
    };
    tracing::warn!(branch, error = %error, "sub-search failed, dropping source from synthesis");
    chain[step_idx].status = StepStatus::Error;
    None
}

/// Merge settled branch results into ranked evidence plus the context lines
/// fed to answer generation. Order is fixed vector -> graph -> filter, never
/// arrival order, so the 10-source cap truncates filter results first, then
/// graph.
fn synthesize(
    vector_hits: Option<Vec<VectorHit>>,
    graph_hits: Option<Vec<GraphHit>>,
    filter_hits: Option<Vec<Node>>,
) -> (Vec<EvidenceSource>, Vec<String>) {
    let mut sources = Vec::new();
    let mut context = Vec::new();

    for hit in vector_hits.into_iter().flatten().take(VECTOR_SLICE) {
        let mut metadata = Properties::new();
        metadata.insert(
            "similarity".to_string(),
            json!(format!("{:.0}%", hit.similarity * 100.0)),
        );
        context.push(hit.text.clone());
        sources.push(EvidenceSource {
            source_type: SourceType::Vector,
            content: hit.text,
            confidence: hit.similarity,
            metadata,
        });
    }

    for hit in graph_hits.into_iter().flatten().take(GRAPH_SLICE) {
        let node_info = format!("{}: {}", hit.node.label, hit.node.name().unwrap_or("Unknown"));
        let mut metadata = Properties::new();
        metadata.insert("depth".to_string(), json!(hit.depth));
        sources.push(EvidenceSource {
            source_type: SourceType::Graph,
            content: format!("Graph path at depth {}: {}", hit.depth, node_info),
            confidence: (1.0 - hit.depth as f64 * 0.2).max(GRAPH_CONFIDENCE_FLOOR),
            metadata,
        });
        context.push(node_info);
    }

    for node in filter_hits.into_iter().flatten().take(FILTER_SLICE) {
        sources.push(EvidenceSource {
            source_type: SourceType::Filter,
            content: format!(
                "Filtered match: {} - {}",
                node.label,
                node.name().unwrap_or("Unknown")
            ),
            confidence: FILTER_CONFIDENCE,
            metadata: node.properties,
        });
    }

    sources.truncate(MAX_SOURCES);
    (sources, context)
}

/// Weighted mean of evidence confidences (vector 0.4, graph 0.4, filter 0.2),
/// capped at 0.95. Exactly 0.0 for an empty evidence set.
fn calculate_confidence(sources: &[EvidenceSource]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for source in sources {
        let weight = match source.source_type {
            SourceType::Vector => 0.4,
            SourceType::Graph => 0.4,
            SourceType::Filter => 0.2,
        };
        weighted_sum += source.confidence * weight;
        total_weight += weight;
    }
    (weighted_sum / total_weight).min(CONFIDENCE_CAP)
}

fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn push_step(chain: &mut Vec<ReasoningStep>, agent: &str, action: impl Into<String>) -> usize {
    chain.push(ReasoningStep {
        agent: agent.to_string(),
        action: action.into(),
        status: StepStatus::Complete,
        timestamp: now_ts(),
    });
    chain.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graphrag_embed::MockEmbedder;
    use graphrag_graph::InMemoryGraphStore;
    use graphrag_types::{
        EmbedderError, GraphStats, GraphStoreError, Relationship, VectorEntry,
    };
    use graphrag_vector::InMemoryVectorStore;
    use tokio_stream::StreamExt;

    fn props(name: &str) -> Properties {
        let mut p = Properties::new();
        p.insert("name".to_string(), json!(name));
        p
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            graph_depth: 2,
            placeholder_dimension: 8,
            query_timeout: Duration::from_secs(5),
            stream_step_delay: Duration::ZERO,
        }
    }

    async fn alice_manages_bob() -> RetrievalOrchestrator {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let alice = graph.create_node("Person", props("Alice")).await.unwrap();
        let bob = graph.create_node("Person", props("Bob")).await.unwrap();
        graph
            .create_relationship(&alice, &bob, "MANAGES", Properties::new())
            .await
            .unwrap();

        let embedder = MockEmbedder::new(8);
        // Index the passage under the exact embedding the query will get, so
        // it ranks with similarity 1.0.
        let embedding = embedder.embed("Who manages Bob?").await.unwrap();
        let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        vector
            .add(vec![VectorEntry {
                id: "doc1_chunk_0".to_string(),
                embedding,
                text: "Alice leads the team".to_string(),
                metadata: Properties::new(),
            }])
            .await
            .unwrap();

        RetrievalOrchestrator::new(graph, vector, Arc::new(embedder), fast_config())
    }

    #[tokio::test]
    async fn who_manages_bob_end_to_end() {
        let orchestrator = alice_manages_bob().await;
        let response = orchestrator
            .execute_query(&QueryRequest::new("Who manages Bob?"))
            .await
            .unwrap();

        let graph_sources: Vec<&EvidenceSource> = response
            .sources
            .iter()
            .filter(|s| s.source_type == SourceType::Graph)
            .collect();
        assert!(
            graph_sources
                .iter()
                .any(|s| s.content.contains("Alice") && s.confidence >= 0.3),
            "sources: {:?}",
            response.sources
        );
        assert!(response.confidence > 0.0);
        assert!(!response.answer.is_empty());
        assert_eq!(response.reasoning_chain[0].agent, COORDINATOR);
        assert_eq!(
            response.reasoning_chain.last().unwrap().agent,
            SYNTHESIS_AGENT
        );
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let orchestrator = alice_manages_bob().await;
        let err = orchestrator
            .execute_query(&QueryRequest::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyQuery));
    }

    #[tokio::test]
    async fn disabled_branches_are_not_dispatched() {
        let orchestrator = alice_manages_bob().await;
        let mut request = QueryRequest::new("Who manages Bob?");
        request.use_graph = false;
        let response = orchestrator.execute_query(&request).await.unwrap();

        assert!(response
            .sources
            .iter()
            .all(|s| s.source_type == SourceType::Vector));
        assert!(response
            .reasoning_chain
            .iter()
            .all(|s| s.agent != GRAPH_AGENT));
    }

    struct FailingGraphStore;

    #[async_trait]
    impl GraphStore for FailingGraphStore {
        async fn create_node(&self, _: &str, _: Properties) -> Result<String, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn create_relationship(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: Properties,
        ) -> Result<String, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn execute_query(
            &self,
            _: &str,
            _: Option<&Properties>,
        ) -> Result<Vec<serde_json::Value>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn get_stats(&self) -> Result<GraphStats, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn reset(&self) -> Result<(), GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn search_by_graph(&self, _: &str, _: usize) -> Result<Vec<GraphHit>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn search_by_filter(&self, _: &Properties) -> Result<Vec<Node>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn all_nodes(&self) -> Result<Vec<Node>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn all_relationships(&self) -> Result<Vec<Relationship>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn set_node_properties(&self, _: &str, _: Properties) -> Result<(), GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn remove_node(&self, _: &str) -> Result<(), GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn redirect_relationships(&self, _: &str, _: &str) -> Result<usize, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
        async fn remove_nodes_by_property(
            &self,
            _: &str,
            _: &serde_json::Value,
        ) -> Result<usize, GraphStoreError> {
            Err(GraphStoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn failed_graph_branch_degrades_instead_of_failing() {
        let embedder = MockEmbedder::new(8);
        let embedding = embedder.embed("Who manages Bob?").await.unwrap();
        let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        vector
            .add(vec![VectorEntry {
                id: "doc1_chunk_0".to_string(),
                embedding,
                text: "Alice leads the team".to_string(),
                metadata: Properties::new(),
            }])
            .await
            .unwrap();
        let orchestrator = RetrievalOrchestrator::new(
            Arc::new(FailingGraphStore),
            vector,
            Arc::new(embedder),
            fast_config(),
        );

        let response = orchestrator
            .execute_query(&QueryRequest::new("Who manages Bob?"))
            .await
            .unwrap();

        assert!(response
            .sources
            .iter()
            .all(|s| s.source_type == SourceType::Vector));
        let graph_step = response
            .reasoning_chain
            .iter()
            .find(|s| s.agent == GRAPH_AGENT)
            .unwrap();
        assert_eq!(graph_step.status, StepStatus::Error);
        assert!(response.confidence > 0.0);
    }

    struct SleepyEmbedder;

    #[async_trait]
    impl Embedder for SleepyEmbedder {
        async fn embed_batch(&self, _: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![vec![0.0; 4]])
        }
    }

    #[tokio::test]
    async fn blown_budget_reports_timeout() {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let config = OrchestratorConfig {
            query_timeout: Duration::from_millis(50),
            ..fast_config()
        };
        let orchestrator =
            RetrievalOrchestrator::new(graph, vector, Arc::new(SleepyEmbedder), config);

        let err = orchestrator
            .execute_query(&QueryRequest::new("anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(50)));
    }

    /// Graph store whose traversal takes long enough to outlive a short query
    /// budget; `completed` flips only if the sub-search runs to the end.
    struct SlowGraphStore {
        completed: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl GraphStore for SlowGraphStore {
        async fn create_node(&self, _: &str, _: Properties) -> Result<String, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn create_relationship(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: Properties,
        ) -> Result<String, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn execute_query(
            &self,
            _: &str,
            _: Option<&Properties>,
        ) -> Result<Vec<serde_json::Value>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn get_stats(&self) -> Result<GraphStats, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn reset(&self) -> Result<(), GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn search_by_graph(&self, _: &str, _: usize) -> Result<Vec<GraphHit>, GraphStoreError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.completed
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(Vec::new())
        }
        async fn search_by_filter(&self, _: &Properties) -> Result<Vec<Node>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn all_nodes(&self) -> Result<Vec<Node>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn all_relationships(&self) -> Result<Vec<Relationship>, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn set_node_properties(&self, _: &str, _: Properties) -> Result<(), GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn remove_node(&self, _: &str) -> Result<(), GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn redirect_relationships(&self, _: &str, _: &str) -> Result<usize, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
        async fn remove_nodes_by_property(
            &self,
            _: &str,
            _: &serde_json::Value,
        ) -> Result<usize, GraphStoreError> {
            Err(GraphStoreError::Unavailable("slow".into()))
        }
    }

    #[tokio::test]
    async fn blown_budget_cancels_in_flight_sub_searches() {
        let completed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let graph: Arc<dyn GraphStore> = Arc::new(SlowGraphStore {
            completed: Arc::clone(&completed),
        });
        let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let config = OrchestratorConfig {
            query_timeout: Duration::from_millis(50),
            ..fast_config()
        };
        let orchestrator =
            RetrievalOrchestrator::new(graph, vector, Arc::new(MockEmbedder::new(8)), config);

        let err = orchestrator
            .execute_query(&QueryRequest::new("Who manages Bob?"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(50)));

        // Long enough for the traversal to have finished had it kept running.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(
            !completed.load(std::sync::atomic::Ordering::SeqCst),
            "graph sub-search survived its cancelled query"
        );
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed_batch(&self, _: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            Err(EmbedderError::Other("endpoint down".into()))
        }
    }

    #[tokio::test]
    async fn failed_embedding_degrades_to_placeholder_vector() {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        // Indexed under the placeholder vector itself, so the degraded branch
        // still ranks it at full similarity.
        vector
            .add(vec![VectorEntry {
                id: "doc1_chunk_0".to_string(),
                embedding: vec![0.1; 8],
                text: "Quarterly revenue grew ten percent".to_string(),
                metadata: Properties::new(),
            }])
            .await
            .unwrap();
        let orchestrator =
            RetrievalOrchestrator::new(graph, vector, Arc::new(BrokenEmbedder), fast_config());

        let response = orchestrator
            .execute_query(&QueryRequest::new("What was the revenue growth?"))
            .await
            .unwrap();

        let vector_sources: Vec<&EvidenceSource> = response
            .sources
            .iter()
            .filter(|s| s.source_type == SourceType::Vector)
            .collect();
        assert_eq!(vector_sources.len(), 1);
        assert!((vector_sources[0].confidence - 1.0).abs() < 1e-9);
        let vector_step = response
            .reasoning_chain
            .iter()
            .find(|s| s.agent == VECTOR_AGENT)
            .unwrap();
        assert_eq!(vector_step.status, StepStatus::Complete);
    }

    #[tokio::test]
    async fn stream_emits_each_step_then_the_result() {
        let orchestrator = alice_manages_bob().await;
        let stream = orchestrator
            .stream_query(&QueryRequest::new("Who manages Bob?"))
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        assert!(events.len() >= 3);
        assert!(matches!(events.last(), Some(StreamEvent::Result(_))));
        let steps = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Step(_)))
            .count();
        assert_eq!(steps, events.len() - 1);
        if let Some(StreamEvent::Result(response)) = events.last() {
            assert_eq!(response.reasoning_chain.len(), steps);
        }
    }

    #[test]
    fn confidence_is_zero_for_empty_evidence_and_capped_otherwise() {
        assert_eq!(calculate_confidence(&[]), 0.0);

        let maxed: Vec<EvidenceSource> = (0..10)
            .map(|_| EvidenceSource {
                source_type: SourceType::Vector,
                content: "x".to_string(),
                confidence: 1.0,
                metadata: Properties::new(),
            })
            .collect();
        assert_eq!(calculate_confidence(&maxed), 0.95);
    }

    #[test]
    fn synthesis_caps_at_ten_truncating_filter_first() {
        let vector_hits: Vec<VectorHit> = (0..8)
            .map(|i| VectorHit {
                id: format!("v{i}"),
                text: format!("text {i}"),
                similarity: 0.9,
                metadata: Properties::new(),
            })
            .collect();
        let graph_hits: Vec<GraphHit> = (0..7)
            .map(|i| GraphHit {
                node: Node {
                    id: format!("g{i}"),
                    label: "Person".to_string(),
                    properties: props(&format!("person {i}")),
                },
                depth: i,
            })
            .collect();
        let filter_hits: Vec<Node> = (0..5)
            .map(|i| Node {
                id: format!("f{i}"),
                label: "Org".to_string(),
                properties: props(&format!("org {i}")),
            })
            .collect();

        let (sources, _) = synthesize(Some(vector_hits), Some(graph_hits), Some(filter_hits));
        assert_eq!(sources.len(), 10);
        let vectors = sources
            .iter()
            .filter(|s| s.source_type == SourceType::Vector)
            .count();
        let graphs = sources
            .iter()
            .filter(|s| s.source_type == SourceType::Graph)
            .count();
        let filters = sources
            .iter()
            .filter(|s| s.source_type == SourceType::Filter)
            .count();
        assert_eq!((vectors, graphs, filters), (5, 5, 0));
    }

    #[test]
    fn graph_confidence_decays_with_depth_to_a_floor() {
        let graph_hits: Vec<GraphHit> = (0..5)
            .map(|depth| GraphHit {
                node: Node {
                    id: depth.to_string(),
                    label: "Person".to_string(),
                    properties: props("p"),
                },
                depth,
            })
            .collect();
        let (sources, _) = synthesize(None, Some(graph_hits), None);
        let confidences: Vec<f64> = sources.iter().map(|s| s.confidence).collect();
        let expected = [1.0, 0.8, 0.6, 0.4, 0.3];
        assert_eq!(confidences.len(), expected.len());
        for (got, want) in confidences.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
    }
}
