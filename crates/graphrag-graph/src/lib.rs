//! Graph store backends: in-memory reference store and Neo4j HTTP adapter.

mod factory;
mod memory;
mod neo4j;

pub use factory::connect_store;
pub use graphrag_types::{
    GraphHit, GraphStats, GraphStore, GraphStoreError, Node, Properties, Relationship,
};
pub use memory::InMemoryGraphStore;
pub use neo4j::Neo4jHttpStore;
