//! Entity resolution: collapse near-duplicate graph nodes introduced by
//! repeated extraction across chunks and documents.
//!
//! Runs as a post-ingestion pass over the graph store; callers must serialize
//! it against concurrent ingestion.

mod similarity;

use graphrag_types::{GraphStore, GraphStoreError, Node, Properties, ResolutionReport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub use similarity::{name_similarity, sequence_ratio, token_jaccard};

pub struct EntityResolver {
    graph: Arc<dyn GraphStore>,
    similarity_threshold: f64,
}

impl EntityResolver {
    pub fn new(graph: Arc<dyn GraphStore>, similarity_threshold: f64) -> Self {
        Self {
            graph,
            similarity_threshold,
        }
    }

    /// Find and merge duplicate entities. Idempotent on a stable store: a
    /// second run without new ingestion reports zero merges.
    pub async fn resolve_entities(&self) -> Result<ResolutionReport, GraphStoreError> {
        let started = Instant::now();
        let nodes = self.graph.all_nodes().await?;
        let total_entities = nodes.len();

        // Partition by label, keeping store order within each partition.
        let mut label_order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Node>> = HashMap::new();
        for node in nodes {
            if !groups.contains_key(&node.label) {
                label_order.push(node.label.clone());
            }
            groups.entry(node.label.clone()).or_default().push(node);
        }

        let mut merged_entities = 0;
        for label in &label_order {
            let group = &groups[label];
            for cluster in find_clusters(group, self.similarity_threshold) {
                if cluster.len() > 1 {
                    self.merge_cluster(group, &cluster).await?;
                    merged_entities += cluster.len() - 1;
                }
            }
        }

        let report = ResolutionReport {
            merged_entities,
            total_entities,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        tracing::info!(
            merged = report.merged_entities,
            total = report.total_entities,
            "entity resolution pass complete"
        );
        Ok(report)
    }

    /// Merge one duplicate cluster: pick the canonical member, fold in
    /// non-conflicting properties, redirect every relationship endpoint, and
    /// remove the rest.
    async fn merge_cluster(
        &self,
        nodes: &[Node],
        cluster: &[usize],
    ) -> Result<(), GraphStoreError> {
        // Canonical = most properties; strict comparison keeps the first seen
        // on ties.
        let mut canonical = cluster[0];
        for &idx in cluster {
            if nodes[idx].properties.len() > nodes[canonical].properties.len() {
                canonical = idx;
            }
        }
        let canonical_id = nodes[canonical].id.clone();

        let mut merged_props: Properties = nodes[canonical].properties.clone();
        for &idx in cluster {
            if idx == canonical {
                continue;
            }
            // First-seen value wins per key; later duplicates are discarded.
            for (key, value) in &nodes[idx].properties {
                merged_props
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
            self.graph
                .redirect_relationships(&nodes[idx].id, &canonical_id)
                .await?;
            self.graph.remove_node(&nodes[idx].id).await?;
            tracing::debug!(
                duplicate = %nodes[idx].id,
                canonical = %canonical_id,
                "merged duplicate entity"
            );
        }
        self.graph
            .set_node_properties(&canonical_id, merged_props)
            .await?;
        Ok(())
    }
}

/// Greedy single-link clustering over one label partition. Deliberately not
/// transitive-closure clustering: each unassigned node is compared against
/// the cluster seed only, in store order, so a node similar to a later member
/// but not to the seed stays out.
fn find_clusters(nodes: &[Node], threshold: f64) -> Vec<Vec<usize>> {
    let names: Vec<String> = nodes
        .iter()
        .map(|n| n.name().unwrap_or("").to_lowercase())
        .collect();
    let mut assigned = vec![false; nodes.len()];
    let mut clusters = Vec::new();
    for i in 0..nodes.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut cluster = vec![i];
        for j in (i + 1)..nodes.len() {
            if assigned[j] {
                continue;
            }
            if name_similarity(&names[i], &names[j]) >= threshold {
                assigned[j] = true;
                cluster.push(j);
            }
        }
        clusters.push(cluster);
    }
    clusters
}
