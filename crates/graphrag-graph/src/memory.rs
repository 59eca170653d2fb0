//! In-memory graph store: the reference backend.

use async_trait::async_trait;
use graphrag_types::{
    GraphHit, GraphStats, GraphStore, GraphStoreError, Node, Properties, Relationship,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store state behind one single-writer lock, so resolver merges and resets
/// are atomic with respect to concurrent traversals.
#[derive(Default)]
struct GraphState {
    /// node_id -> node.
    nodes: HashMap<String, Node>,
    /// Node ids in insertion order; store iteration order is defined as this.
    order: Vec<String>,
    relationships: Vec<Relationship>,
    /// Monotonic counters; ids are never reused, even after removal or merge.
    node_counter: u64,
    rel_counter: u64,
}

impl GraphState {
    fn nodes_in_order(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    fn drop_node(&mut self, id: &str) {
        self.nodes.remove(id);
        self.order.retain(|x| x != id);
    }
}

/// In-memory implementation of GraphStore.
pub struct InMemoryGraphStore {
    state: Arc<RwLock<GraphState>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(GraphState::default())),
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn create_node(
        &self,
        label: &str,
        properties: Properties,
    ) -> Result<String, GraphStoreError> {
        let mut state = self.state.write().await;
        let id = state.node_counter.to_string();
        state.node_counter += 1;
        state.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                label: label.to_string(),
                properties,
            },
        );
        state.order.push(id.clone());
        Ok(id)
    }

    async fn create_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        rel_type: &str,
        properties: Properties,
    ) -> Result<String, GraphStoreError> {
        let mut state = self.state.write().await;
        let id = state.rel_counter.to_string();
        state.rel_counter += 1;
        state.relationships.push(Relationship {
            id: id.clone(),
            source: source_id.to_string(),
            target: target_id.to_string(),
            rel_type: rel_type.to_string(),
            properties,
        });
        Ok(id)
    }

    async fn execute_query(
        &self,
        query: &str,
        _params: Option<&Properties>,
    ) -> Result<Vec<serde_json::Value>, GraphStoreError> {
        let state = self.state.read().await;
        // Only the two fixed patterns are recognized; everything else yields
        // an empty record list.
        if query.contains("MATCH (n)") {
            return state
                .nodes_in_order()
                .map(|n| serde_json::to_value(n).map_err(|e| GraphStoreError::Other(e.to_string())))
                .collect();
        }
        if query.contains("MATCH ()-[r]->()") {
            return state
                .relationships
                .iter()
                .map(|r| serde_json::to_value(r).map_err(|e| GraphStoreError::Other(e.to_string())))
                .collect();
        }
        Ok(Vec::new())
    }

    async fn get_stats(&self) -> Result<GraphStats, GraphStoreError> {
        let state = self.state.read().await;
        let mut entity_types: HashMap<String, usize> = HashMap::new();
        let mut attributes = 0;
        for node in state.nodes.values() {
            *entity_types.entry(node.label.clone()).or_insert(0) += 1;
            attributes += node.properties.len();
        }
        Ok(GraphStats {
            entities: state.nodes.len(),
            relationships: state.relationships.len(),
            attributes,
            entity_types,
        })
    }

    async fn reset(&self) -> Result<(), GraphStoreError> {
        let mut state = self.state.write().await;
        *state = GraphState::default();
        Ok(())
    }

    async fn search_by_graph(
        &self,
        entity: &str,
        depth: usize,
    ) -> Result<Vec<GraphHit>, GraphStoreError> {
        let state = self.state.read().await;
        let fragment = entity.to_lowercase();
        // First insertion-order match only; ties resolved by store order.
        let seed = state.nodes_in_order().find(|n| {
            n.name()
                .map(|name| name.to_lowercase().contains(&fragment))
                .unwrap_or(false)
        });
        let Some(seed) = seed else {
            return Ok(Vec::new());
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut hits = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((seed.id.clone(), 0));

        while let Some((node_id, curr_depth)) = queue.pop_front() {
            if curr_depth > depth || !visited.insert(node_id.clone()) {
                continue;
            }
            // A dangling endpoint is tolerated: it is marked visited and
            // expanded, just never reported.
            if let Some(node) = state.nodes.get(&node_id) {
                hits.push(GraphHit {
                    node: node.clone(),
                    depth: curr_depth,
                });
            }
            for rel in &state.relationships {
                if rel.source == node_id {
                    queue.push_back((rel.target.clone(), curr_depth + 1));
                } else if rel.target == node_id {
                    queue.push_back((rel.source.clone(), curr_depth + 1));
                }
            }
        }
        Ok(hits)
    }

    async fn search_by_filter(&self, filters: &Properties) -> Result<Vec<Node>, GraphStoreError> {
        let state = self.state.read().await;
        let matched = state
            .nodes_in_order()
            .filter(|node| {
                filters
                    .iter()
                    .all(|(k, v)| node.properties.get(k) == Some(v))
            })
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn all_nodes(&self) -> Result<Vec<Node>, GraphStoreError> {
        let state = self.state.read().await;
        Ok(state.nodes_in_order().cloned().collect())
    }

    async fn all_relationships(&self) -> Result<Vec<Relationship>, GraphStoreError> {
        let state = self.state.read().await;
        Ok(state.relationships.clone())
    }

    async fn set_node_properties(
        &self,
        id: &str,
        properties: Properties,
    ) -> Result<(), GraphStoreError> {
        let mut state = self.state.write().await;
        let node = state
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphStoreError::NotFound(id.to_string()))?;
        node.properties = properties;
        Ok(())
    }

    async fn remove_node(&self, id: &str) -> Result<(), GraphStoreError> {
        let mut state = self.state.write().await;
        if !state.nodes.contains_key(id) {
            return Err(GraphStoreError::NotFound(id.to_string()));
        }
        state.drop_node(id);
        Ok(())
    }

    async fn redirect_relationships(
        &self,
        old_id: &str,
        new_id: &str,
    ) -> Result<usize, GraphStoreError> {
        let mut state = self.state.write().await;
        let mut touched = 0;
        for rel in &mut state.relationships {
            let mut changed = false;
            if rel.source == old_id {
                rel.source = new_id.to_string();
                changed = true;
            }
            if rel.target == old_id {
                rel.target = new_id.to_string();
                changed = true;
            }
            if changed {
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn remove_nodes_by_property(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<usize, GraphStoreError> {
        let mut state = self.state.write().await;
        let doomed: Vec<String> = state
            .nodes
            .values()
            .filter(|n| n.properties.get(key) == Some(value))
            .map(|n| n.id.clone())
            .collect();
        for id in &doomed {
            state.drop_node(id);
        }
        let removed: HashSet<&String> = doomed.iter().collect();
        state
            .relationships
            .retain(|r| !removed.contains(&r.source) && !removed.contains(&r.target));
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(name: &str) -> Properties {
        let mut p = Properties::new();
        p.insert("name".to_string(), json!(name));
        p
    }

    #[tokio::test]
    async fn traversal_respects_depth_bound_and_visits_once() {
        let store = InMemoryGraphStore::new();
        let a = store.create_node("Person", props("Alice")).await.unwrap();
        let b = store.create_node("Person", props("Bob")).await.unwrap();
        let c = store.create_node("Person", props("Carol")).await.unwrap();
        let d = store.create_node("Person", props("Dave")).await.unwrap();
        store
            .create_relationship(&a, &b, "KNOWS", Properties::new())
            .await
            .unwrap();
        store
            .create_relationship(&b, &c, "KNOWS", Properties::new())
            .await
            .unwrap();
        store
            .create_relationship(&c, &d, "KNOWS", Properties::new())
            .await
            .unwrap();
        // A cycle back to the seed must not produce a second visit.
        store
            .create_relationship(&c, &a, "KNOWS", Properties::new())
            .await
            .unwrap();

        let hits = store.search_by_graph("alice", 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.node.id.as_str()).collect();
        assert_eq!(ids, vec![a.as_str(), b.as_str(), c.as_str()]);
        assert!(hits.iter().all(|h| h.depth <= 2));
        assert_eq!(hits[0].depth, 0);
        assert_eq!(hits[2].depth, 2);
    }

    #[tokio::test]
    async fn traversal_follows_incoming_edges_too() {
        let store = InMemoryGraphStore::new();
        let alice = store.create_node("Person", props("Alice")).await.unwrap();
        let bob = store.create_node("Person", props("Bob")).await.unwrap();
        store
            .create_relationship(&alice, &bob, "MANAGES", Properties::new())
            .await
            .unwrap();

        let hits = store.search_by_graph("Bob", 1).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].node.id, alice);
        assert_eq!(hits[1].depth, 1);
    }

    #[tokio::test]
    async fn unmatched_entity_yields_empty_not_error() {
        let store = InMemoryGraphStore::new();
        store.create_node("Person", props("Alice")).await.unwrap();
        let hits = store.search_by_graph("Zeus", 2).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn dangling_relationship_does_not_break_traversal() {
        let store = InMemoryGraphStore::new();
        let a = store.create_node("Person", props("Alice")).await.unwrap();
        store
            .create_relationship(&a, "999", "KNOWS", Properties::new())
            .await
            .unwrap();

        let hits = store.search_by_graph("Alice", 2).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node.id, a);
    }

    #[tokio::test]
    async fn query_matcher_supports_exactly_two_patterns() {
        let store = InMemoryGraphStore::new();
        store.create_node("Person", props("Alice")).await.unwrap();
        let b = store.create_node("Person", props("Bob")).await.unwrap();
        store
            .create_relationship("0", &b, "KNOWS", Properties::new())
            .await
            .unwrap();

        let nodes = store.execute_query("MATCH (n) RETURN n", None).await.unwrap();
        assert_eq!(nodes.len(), 2);
        let rels = store
            .execute_query("MATCH ()-[r]->() RETURN r", None)
            .await
            .unwrap();
        assert_eq!(rels.len(), 1);
        let other = store
            .execute_query("MATCH (a)-[:KNOWS]->(b) RETURN a, b", None)
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn stats_sum_property_map_sizes() {
        let store = InMemoryGraphStore::new();
        let mut p = props("Alice");
        p.insert("role".to_string(), json!("manager"));
        store.create_node("Person", p).await.unwrap();
        store.create_node("Organization", props("Acme")).await.unwrap();
        store
            .create_relationship("0", "1", "WORKS_AT", Properties::new())
            .await
            .unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.relationships, 1);
        assert_eq!(stats.attributes, 3);
        assert_eq!(stats.entity_types.get("Person"), Some(&1));
        assert_eq!(stats.entity_types.get("Organization"), Some(&1));
    }

    #[tokio::test]
    async fn node_ids_are_never_reused() {
        let store = InMemoryGraphStore::new();
        let a = store.create_node("Person", props("Alice")).await.unwrap();
        store.remove_node(&a).await.unwrap();
        let b = store.create_node("Person", props("Bob")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn remove_by_property_drops_nodes_and_their_relationships() {
        let store = InMemoryGraphStore::new();
        let mut p = props("Alice");
        p.insert("source_document".to_string(), json!("doc1"));
        let a = store.create_node("Person", p).await.unwrap();
        let b = store.create_node("Person", props("Bob")).await.unwrap();
        store
            .create_relationship(&a, &b, "KNOWS", Properties::new())
            .await
            .unwrap();

        let removed = store
            .remove_nodes_by_property("source_document", &json!("doc1"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.all_relationships().await.unwrap().is_empty());
        assert_eq!(store.all_nodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let store = InMemoryGraphStore::new();
        store.create_node("Person", props("Alice")).await.unwrap();
        store
            .create_relationship("0", "0", "SELF", Properties::new())
            .await
            .unwrap();
        store.reset().await.unwrap();
        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.entities, 0);
        assert_eq!(stats.relationships, 0);
    }
}
