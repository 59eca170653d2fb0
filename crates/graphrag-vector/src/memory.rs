//! In-memory vector store (linear-scan cosine KNN).

use async_trait::async_trait;
use graphrag_types::{VectorEntry, VectorHit, VectorStore, VectorStoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[derive(Default)]
struct VectorState {
    /// Entries in insertion order; similarity ties resolve to this order.
    entries: Vec<VectorEntry>,
    /// id -> position in `entries`, for upserts.
    index: HashMap<String, usize>,
}

/// In-memory VectorStore: O(n) scan per query, no index structure.
pub struct InMemoryVectorStore {
    state: Arc<RwLock<VectorState>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(VectorState::default())),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, entries: Vec<VectorEntry>) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().await;
        for entry in entries {
            match state.index.get(&entry.id).copied() {
                Some(pos) => state.entries[pos] = entry,
                None => {
                    let pos = state.entries.len();
                    state.index.insert(entry.id.clone(), pos);
                    state.entries.push(entry);
                }
            }
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorStoreError> {
        let state = self.state.read().await;
        let mut hits: Vec<VectorHit> = Vec::with_capacity(state.entries.len());
        for entry in &state.entries {
            // A dimension mismatch would silently degrade to a bogus score;
            // raise it instead.
            if entry.embedding.len() != query.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    query: query.len(),
                    stored: entry.embedding.len(),
                    entry_id: entry.id.clone(),
                });
            }
            hits.push(VectorHit {
                id: entry.id.clone(),
                text: entry.text.clone(),
                similarity: cosine_similarity(query, &entry.embedding),
                metadata: entry.metadata.clone(),
            });
        }
        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<usize, VectorStoreError> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|e| !e.id.starts_with(prefix));
        state.index = state
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Ok(before - state.entries.len())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.state.read().await.entries.len())
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().await;
        *state = VectorState::default();
        Ok(())
    }
}
