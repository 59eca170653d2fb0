//! Core types and traits for the GraphRAG retrieval kernel.
//!
//! Request/response DTOs keep the JSON shape of the query API
//! (`answer` / `sources` / `reasoning_chain` / `confidence`).

mod dto;
mod model;
mod settings;
mod traits;

pub use dto::*;
pub use model::*;
pub use settings::Settings;
pub use traits::*;
