//! Application state for the RAG server

use dashmap::DashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::ingestion::{Chunker, IngestPipeline};
use crate::providers::{
    EmbeddingProvider, GenerationProvider, MockEmbedder, OllamaClient, OllamaEmbedder,
    OllamaGenerator,
};
use crate::retrieval::QueryPipeline;
use crate::retry::RetryPolicy;
use crate::types::response::{HealthComponents, HealthResponse, KnowledgeBaseStats};
use crate::types::Document;

/// Default number of chunks retrieved per query
const DEFAULT_TOP_K: usize = 5;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Vector index shared by both pipelines
    index: Arc<VectorIndex>,
    /// Generation provider
    generator: Arc<dyn GenerationProvider>,
    /// Ollama client (passthrough and streaming endpoints)
    ollama: Arc<OllamaClient>,
    /// Label of the embedder selected at startup
    embedding_label: String,
    /// Ingestion pipeline
    ingest: IngestPipeline,
    /// Query pipeline
    query: QueryPipeline,
    /// Document registry (persisted to disk)
    documents: DashMap<Uuid, Document>,
    /// Path to the registry file
    documents_path: PathBuf,
    /// Directory uploaded files are stored in before ingestion
    uploads_dir: PathBuf,
}

impl AppState {
    /// Create new application state.
    ///
    /// Provider selection and index bootstrap happen here, once per process.
    /// Vector index setup is retried with a fixed backoff; exhausting the
    /// retries is fatal: the service cannot operate without a working index.
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");

        fs::create_dir_all(&config.vector_db.storage_path)?;

        let ollama = Arc::new(OllamaClient::new(&config.llm));

        // Select the embedding provider once at startup. When the primary
        // model is unreachable the deterministic fallback takes its place
        // for the lifetime of the process.
        let primary = OllamaEmbedder::new(Arc::clone(&ollama), config.embedding.dimensions);
        let (embedder, embedding_label): (Arc<dyn EmbeddingProvider>, String) =
            match primary.health_check().await {
                Ok(true) => {
                    tracing::info!(
                        "Using Ollama embeddings (model: {})",
                        config.llm.embed_model
                    );
                    (Arc::new(primary), config.llm.embed_model.clone())
                }
                _ => {
                    tracing::warn!(
                        "Failed to reach embedding model '{}', using deterministic fallback ({} dims)",
                        config.llm.embed_model,
                        config.embedding.fallback_dimensions
                    );
                    (
                        Arc::new(MockEmbedder::new(config.embedding.fallback_dimensions)),
                        "deterministic-fallback".to_string(),
                    )
                }
            };

        let setup_retry = RetryPolicy::fixed(
            config.retry.max_retries,
            Duration::from_secs(config.retry.setup_backoff_secs),
        );

        // Index bootstrap: load the persisted collection; when that fails
        // for good, fall back to a fresh empty collection persisted
        // immediately. Only failing to create the store is fatal.
        let dimensions = embedder.dimensions();
        let vector_db = config.vector_db.clone();
        let index = match setup_retry
            .run("vector index load", || async {
                VectorIndex::open(&vector_db, dimensions)
            })
            .await
        {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(
                    "Failed to load vector index: {}, creating a new empty collection",
                    e
                );
                setup_retry
                    .run("vector index create", || async {
                        VectorIndex::create(&vector_db, dimensions)
                    })
                    .await?
            }
        };
        let index = Arc::new(index);
        tracing::info!(
            "Vector index ready (collection: {}, {} entries)",
            index.collection(),
            index.len()
        );

        let generator: Arc<dyn GenerationProvider> =
            Arc::new(OllamaGenerator::new(Arc::clone(&ollama)));

        let ingest = IngestPipeline::new(
            Chunker::from_config(&config.chunking),
            Arc::clone(&embedder),
            Arc::clone(&index),
            config.retry.max_retries,
        );

        let query = QueryPipeline::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            Arc::clone(&generator),
            DEFAULT_TOP_K,
            RetryPolicy::fixed(
                config.retry.max_retries,
                Duration::from_secs(config.retry.setup_backoff_secs),
            ),
        );

        let documents_path = config.vector_db.storage_path.join("documents.json");
        let documents = Self::load_documents(&documents_path);
        tracing::info!("Loaded {} documents from registry", documents.len());

        let uploads_dir = config.vector_db.storage_path.join("uploads");
        fs::create_dir_all(&uploads_dir)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                index,
                generator,
                ollama,
                embedding_label,
                ingest,
                query,
                documents,
                documents_path,
                uploads_dir,
            }),
        })
    }

    /// Load documents from disk
    fn load_documents(path: &PathBuf) -> DashMap<Uuid, Document> {
        let documents = DashMap::new();

        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<Vec<Document>>(&content) {
                    Ok(docs) => {
                        for doc in docs {
                            documents.insert(doc.id, doc);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse documents.json: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read documents.json: {}", e);
                }
            }
        }

        documents
    }

    /// Save documents to disk
    fn save_documents(&self) {
        let docs: Vec<Document> = self
            .inner
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        match serde_json::to_string_pretty(&docs) {
            Ok(content) => {
                if let Err(e) = fs::write(&self.inner.documents_path, content) {
                    tracing::error!("Failed to save documents.json: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize documents: {}", e);
            }
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the ingestion pipeline
    pub fn ingest_pipeline(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    /// Get the query pipeline
    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.inner.query
    }

    /// Get the Ollama client (passthrough and streaming endpoints)
    pub fn ollama(&self) -> &Arc<OllamaClient> {
        &self.inner.ollama
    }

    /// Directory uploaded files are written to before ingestion
    pub fn uploads_dir(&self) -> &PathBuf {
        &self.inner.uploads_dir
    }

    /// Add a document to the registry (persisted to disk)
    pub fn add_document(&self, doc: Document) {
        self.inner.documents.insert(doc.id, doc);
        self.save_documents();
    }

    /// List all registered documents
    pub fn list_documents(&self) -> Vec<Document> {
        self.inner
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Remove a document and its index entries. Returns the number of index
    /// entries deleted, or None when the document is unknown.
    pub fn remove_document(&self, id: &Uuid) -> Result<Option<usize>> {
        if self.inner.documents.remove(id).is_none() {
            return Ok(None);
        }

        let deleted = self.inner.index.delete_by_document(id)?;
        self.inner.index.persist()?;
        self.save_documents();

        Ok(Some(deleted))
    }

    /// Knowledge base statistics, recomputed from the index
    pub fn stats(&self) -> KnowledgeBaseStats {
        KnowledgeBaseStats {
            document_count: self.inner.index.len(),
            vector_store: "hnsw".to_string(),
            embedding_model: self.inner.embedding_label.clone(),
            persist_dir: self.inner.index.persist_dir().display().to_string(),
        }
    }

    /// Aggregate component health into an overall status
    pub async fn health(&self) -> HealthResponse {
        let llm_ok = self
            .inner
            .generator
            .health_check()
            .await
            .unwrap_or(false);
        let index_ok = self.inner.index.persist_dir().exists();

        let status = match (llm_ok, index_ok) {
            (true, true) => "healthy",
            (false, true) => "degraded",
            (_, false) => "unhealthy",
        };

        HealthResponse {
            status: status.to_string(),
            components: HealthComponents {
                generation_provider: if llm_ok { "ok" } else { "unreachable" }.to_string(),
                vector_index: if index_ok { "ok" } else { "missing" }.to_string(),
                embedding_provider: self.inner.embedding_label.clone(),
                knowledge_base_documents: self.inner.index.len(),
            },
        }
    }
}
