//! Response types for queries, uploads, stats, and health

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Document, FileType};

/// Outcome of a retrieval-augmented query.
///
/// The query pipeline never propagates errors to its caller: on internal
/// failure `answer` carries a user-safe apology and `error` the cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Generated answer
    pub answer: String,
    /// Number of chunks retrieved (before truncation to the context window)
    pub sources_used: usize,
    /// Source file names of the top-ranked chunks
    pub source_previews: Vec<String>,
    /// Length of the assembled context, in characters
    pub context_length: usize,
    /// Error description when the query failed internally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutcome {
    /// Validation failure (no retrieval, no generation)
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            answer: String::new(),
            sources_used: 0,
            source_previews: Vec::new(),
            context_length: 0,
            error: Some(message.into()),
        }
    }

    /// Internal failure with a user-safe apologetic answer
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            answer: "Sorry, something went wrong while searching the documents.".to_string(),
            sources_used: 0,
            source_previews: Vec::new(),
            context_length: 0,
            error: Some(message.into()),
        }
    }
}

/// Knowledge base statistics, recomputed on demand from the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseStats {
    /// Number of indexed entries
    pub document_count: usize,
    /// Vector store backend label
    pub vector_store: String,
    /// Embedding model label
    pub embedding_model: String,
    /// Persistence directory
    pub persist_dir: String,
}

/// Response from `POST /api/rag/upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub message: String,
    pub document_id: Uuid,
}

/// Response from `POST /api/rag/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub sources_used: usize,
    pub sources: Vec<String>,
    pub context_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Build the wire response from a query outcome
    pub fn from_outcome(question: String, outcome: QueryOutcome) -> Self {
        Self {
            question,
            answer: outcome.answer,
            sources_used: outcome.sources_used,
            sources: outcome.source_previews,
            context_length: outcome.context_length,
            error: outcome.error,
        }
    }
}

/// Response from `GET /api/rag/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub knowledge_base_status: String,
    pub statistics: KnowledgeBaseStats,
}

/// Component states reported by `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthComponents {
    pub generation_provider: String,
    pub vector_index: String,
    pub embedding_provider: String,
    pub knowledge_base_documents: usize,
}

/// Response from `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// healthy | degraded | unhealthy
    pub status: String,
    pub components: HealthComponents,
}

/// Registry entry returned by `GET /api/rag/documents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub file_type: FileType,
    pub total_chunks: u32,
    pub file_size: u64,
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            file_type: doc.file_type,
            total_chunks: doc.total_chunks,
            file_size: doc.file_size,
            ingested_at: doc.ingested_at,
        }
    }
}
