//! Runtime configuration loaded from environment variables.

use std::str::FromStr;

/// Application settings. Every knob has a usable default so the kernel starts
/// with no environment at all (in-memory stores, template-only answers).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Graph backend selection: "memory" or "neo4j".
    pub graph_db_type: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,

    pub embed_api_url: String,
    pub embed_api_key: Option<String>,
    pub embed_model: String,
    pub embedding_dimension: usize,

    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,

    pub entity_similarity_threshold: f64,
    pub max_vector_results: usize,
    pub graph_traversal_depth: usize,
    pub retrieval_timeout_secs: u64,
    pub stream_step_delay_ms: u64,

    pub listen_addr: String,
    pub registry_path: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            graph_db_type: env_or("GRAPH_DB_TYPE", "memory"),
            neo4j_uri: env_or("NEO4J_URI", "http://localhost:7474"),
            neo4j_user: env_or("NEO4J_USER", "neo4j"),
            neo4j_password: env_or("NEO4J_PASSWORD", ""),
            neo4j_database: env_or("NEO4J_DATABASE", "neo4j"),
            embed_api_url: env_or(
                "EMBED_API_URL",
                "https://api.openai.com/v1/embeddings",
            ),
            embed_api_key: std::env::var("EMBED_API_KEY").ok(),
            embed_model: env_or("EMBED_MODEL", "text-embedding-3-small"),
            embedding_dimension: env_parse("EMBEDDING_DIMENSION", 384),
            llm_api_url: env_or(
                "LLM_API_URL",
                "https://api.openai.com/v1/chat/completions",
            ),
            llm_api_key: std::env::var("LLM_API_KEY").ok(),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            entity_similarity_threshold: env_parse("ENTITY_SIMILARITY_THRESHOLD", 0.75),
            max_vector_results: env_parse("MAX_VECTOR_RESULTS", 10),
            graph_traversal_depth: env_parse("GRAPH_TRAVERSAL_DEPTH", 2),
            retrieval_timeout_secs: env_parse("RETRIEVAL_TIMEOUT_SECONDS", 30),
            stream_step_delay_ms: env_parse("STREAM_STEP_DELAY_MS", 200),
            listen_addr: env_or("GRAPHRAG_LISTEN", "0.0.0.0:8000"),
            registry_path: env_or("DOCUMENT_REGISTRY_PATH", "documents.jsonl"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
