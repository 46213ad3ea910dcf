//! Core data types for documents, chunks, and query results

pub mod document;
pub mod response;

pub use document::{Chunk, Document, FileType, RawTextBlock};
pub use response::{KnowledgeBaseStats, QueryOutcome};
