//! Ingestion pipeline: load, chunk, embed, index, persist

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::providers::EmbeddingProvider;
use crate::retry::RetryPolicy;
use crate::types::document::{hash_content, Chunk, Document, FileType};

use super::chunker::Chunker;
use super::loader::DocumentLoader;

/// Result of ingesting one file
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Registry record for the ingested document
    pub document: Document,
    /// Number of chunks inserted into the index
    pub chunks_inserted: u32,
}

/// Orchestrates Loader -> Chunker -> embedding -> index insert -> persist.
///
/// Re-ingesting a file adds new entries; nothing is deduplicated or replaced.
pub struct IngestPipeline {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    retry: RetryPolicy,
    /// Serializes insert+persist so concurrent ingests cannot interleave
    /// their snapshot writes
    write_lock: Mutex<()>,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        max_retries: u32,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            retry: RetryPolicy::exponential(max_retries),
            write_lock: Mutex::new(()),
        }
    }

    /// Ingest a file into the knowledge base.
    ///
    /// Never propagates an error: the caller sees `true` on success, `false`
    /// plus logs otherwise.
    pub async fn ingest_file(&self, path: &Path) -> bool {
        match self.ingest_path(path).await {
            Ok(report) => {
                tracing::info!(
                    "Successfully ingested {} with {} chunks",
                    path.display(),
                    report.chunks_inserted
                );
                true
            }
            Err(e) => {
                tracing::error!("Error ingesting file {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Ingest a file, returning the registry record and chunk count.
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        if !path.exists() {
            return Err(Error::file_load(
                path.display().to_string(),
                "file not found",
            ));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let data = std::fs::read(path)?;

        self.ingest_bytes(&file_name, &data).await
    }

    /// Ingest already-read file bytes under the given file name.
    pub async fn ingest_bytes(&self, file_name: &str, data: &[u8]) -> Result<IngestReport> {
        let blocks = DocumentLoader::load_bytes(file_name, data);

        let mut document = Document::new(
            file_name.to_string(),
            blocks
                .first()
                .map(|b| b.file_type)
                .unwrap_or(FileType::Unknown),
            hash_content(data),
            data.len() as u64,
        );

        let mut chunks: Vec<Chunk> = Vec::new();
        for block in &blocks {
            let split = self.chunker.split(block, self.embedder.as_ref()).await;
            for chunk in split {
                chunks.push(chunk.with_parent(document.id));
            }
        }
        // The chunker stamps per-block indexes; renumber across blocks so
        // ordering within the document stays 0-based insertion order.
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.chunk_index = i as u32;
        }

        if chunks.is_empty() {
            tracing::warn!("No chunks extracted from {}", file_name);
            return Err(Error::file_load(file_name, "no text content extracted"));
        }

        let inserted = self
            .retry
            .run("file ingestion", || self.embed_and_store(&chunks))
            .await?;

        document.total_chunks = inserted;
        Ok(IngestReport {
            document,
            chunks_inserted: inserted,
        })
    }

    /// Embed every chunk, then insert and persist under the writer lock.
    async fn embed_and_store(&self, chunks: &[Chunk]) -> Result<u32> {
        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.text).await?;
            embedded.push((chunk.clone(), embedding));
        }

        let _guard = self.write_lock.lock().await;
        for (chunk, embedding) in embedded {
            self.index.insert(chunk, embedding)?;
        }
        self.index.persist()?;

        Ok(chunks.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, VectorDbConfig};
    use crate::providers::MockEmbedder;
    use std::io::Write;

    fn pipeline_with(dir: &Path, dimensions: usize) -> IngestPipeline {
        let config = VectorDbConfig {
            storage_path: dir.to_path_buf(),
            ..VectorDbConfig::default()
        };
        let index = Arc::new(VectorIndex::open(&config, dimensions).unwrap());
        let embedder = Arc::new(MockEmbedder::new(dimensions));
        IngestPipeline::new(
            Chunker::from_config(&ChunkingConfig::default()),
            embedder,
            index,
            3,
        )
    }

    #[tokio::test]
    async fn test_ingest_missing_file_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(dir.path(), 32);

        assert!(!pipeline.ingest_file(Path::new("/nonexistent/a.txt")).await);
    }

    #[tokio::test]
    async fn test_ingest_text_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(dir.path(), 32);

        let mut file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .unwrap();
        write!(file, "Employees accrue vacation days monthly.").unwrap();

        assert!(pipeline.ingest_file(file.path()).await);
        assert_eq!(pipeline.index.len(), 1);
    }

    #[tokio::test]
    async fn test_reingest_accumulates_without_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(dir.path(), 32);

        let mut file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .unwrap();
        write!(file, "The expense policy covers travel costs.").unwrap();

        assert!(pipeline.ingest_file(file.path()).await);
        let after_first = pipeline.index.len();
        assert!(pipeline.ingest_file(file.path()).await);

        // Repeated ingestion grows the collection by the same amount
        assert_eq!(pipeline.index.len(), after_first * 2);
    }

    #[tokio::test]
    async fn test_report_carries_document_record() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(dir.path(), 32);

        let report = pipeline
            .ingest_bytes("handbook.md", b"Welcome to the company handbook.")
            .await
            .unwrap();

        assert_eq!(report.document.filename, "handbook.md");
        assert_eq!(report.document.total_chunks, report.chunks_inserted);
        assert!(report.chunks_inserted >= 1);
        assert!(!report.document.content_hash.is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(dir.path(), 32);

        assert!(pipeline.ingest_bytes("empty.txt", b"   ").await.is_err());
    }
}
