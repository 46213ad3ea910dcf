//! Provider abstractions for embeddings and text generation
//!
//! Trait-based seams so the pipelines can run against the real Ollama
//! backend or against test doubles.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::{EmbeddingProvider, MockEmbedder};
pub use llm::GenerationProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator};
