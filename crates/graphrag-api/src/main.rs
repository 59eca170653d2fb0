//! Graph-RAG kernel API server.

use graphrag_agent::{OrchestratorConfig, RetrievalOrchestrator};
use graphrag_api::registry::JsonlDocumentRegistry;
use graphrag_api::server::{self, AppState};
use graphrag_embed::{OpenAiEmbedder, OpenAiGenerator};
use graphrag_graph::connect_store;
use graphrag_types::{Embedder, Settings, VectorStore};
use graphrag_vector::InMemoryVectorStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env();

    let graph = connect_store(&settings).await;
    let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::from_settings(&settings));
    let registry = Arc::new(JsonlDocumentRegistry::new(&settings.registry_path));

    let mut orchestrator = RetrievalOrchestrator::new(
        Arc::clone(&graph),
        Arc::clone(&vector),
        embedder,
        OrchestratorConfig::from_settings(&settings),
    );
    match OpenAiGenerator::from_settings(&settings) {
        Some(generator) => orchestrator = orchestrator.with_generator(Arc::new(generator)),
        None => tracing::info!("no LLM API key configured, answers use templates only"),
    }

    let state = Arc::new(AppState::new(
        Arc::new(orchestrator),
        graph,
        vector,
        registry,
        settings.entity_similarity_threshold,
    ));

    let app = server::router(state);
    let addr: SocketAddr = settings.listen_addr.parse()?;
    tracing::info!("graph-RAG API listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
