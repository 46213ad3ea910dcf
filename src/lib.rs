//! corpdoc-rag: retrieval-augmented generation over a corporate document set
//!
//! This crate ingests heterogeneous documents (text, markdown, JSON, PDF,
//! DOCX), splits them into retrievable chunks, embeds and indexes the chunks
//! in a persistent vector store, and answers questions by retrieving the most
//! relevant chunks and grounding an LLM-generated answer in them.

pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, Document, FileType, RawTextBlock},
    response::{KnowledgeBaseStats, QueryOutcome},
};
