//! Embedding and text-generation collaborators.

mod generator;
#[cfg(feature = "test-util")]
pub mod mock;
mod openai;

pub use generator::OpenAiGenerator;
pub use graphrag_types::{AnswerGenerator, Embedder, EmbedderError, GeneratorError};
pub use openai::OpenAiEmbedder;

#[cfg(feature = "test-util")]
pub use mock::MockEmbedder;
