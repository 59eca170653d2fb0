//! HTTP layer for the graph-RAG kernel.

pub mod registry;
pub mod server;
