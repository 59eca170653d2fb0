//! Vector store trait with brute-force in-memory implementation.

mod memory;

pub use graphrag_types::{VectorEntry, VectorHit, VectorStore, VectorStoreError};
pub use memory::InMemoryVectorStore;
