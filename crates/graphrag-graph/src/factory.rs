//! Backend selection from configuration.

use crate::{InMemoryGraphStore, Neo4jHttpStore};
use graphrag_types::{GraphStore, Settings};
use std::sync::Arc;

/// Build the configured graph store. An unreachable external backend degrades
/// to the in-memory store (reported once) rather than failing the pipeline.
pub async fn connect_store(settings: &Settings) -> Arc<dyn GraphStore> {
    match settings.graph_db_type.as_str() {
        "neo4j" => {
            let store = Neo4jHttpStore::new(
                &settings.neo4j_uri,
                &settings.neo4j_user,
                &settings.neo4j_password,
                &settings.neo4j_database,
            );
            match store.ping().await {
                Ok(()) => {
                    tracing::info!(uri = %settings.neo4j_uri, "connected to neo4j graph backend");
                    Arc::new(store)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "neo4j unavailable, falling back to in-memory graph store");
                    Arc::new(InMemoryGraphStore::new())
                }
            }
        }
        "memory" => Arc::new(InMemoryGraphStore::new()),
        other => {
            tracing::warn!(backend = other, "unknown graph backend, using in-memory store");
            Arc::new(InMemoryGraphStore::new())
        }
    }
}
