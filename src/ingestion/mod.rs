//! Document ingestion: loading, chunking, and the ingest pipeline

mod chunker;
mod loader;
mod pipeline;

pub use chunker::{ChunkStrategyKind, Chunker};
pub use loader::DocumentLoader;
pub use pipeline::{IngestPipeline, IngestReport};
