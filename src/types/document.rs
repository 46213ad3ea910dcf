//! Document, raw text block, and chunk types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain text file
    Text,
    /// Markdown file
    Markdown,
    /// JSON file (flattened to text at load time)
    Json,
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Unknown file type (read as best-effort text)
    Unknown,
}

impl FileType {
    /// Detect file type from extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Self::Text,
            "md" | "markdown" => Self::Markdown,
            "json" => Self::Json,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a file name
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename.rsplit('.').next().unwrap_or("");
        // A name without a dot has no extension
        if ext == filename {
            return Self::Unknown;
        }
        Self::from_extension(ext)
    }

    /// Whether the upload endpoint accepts this type
    pub fn is_upload_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Text => "Text File",
            Self::Markdown => "Markdown",
            Self::Json => "JSON",
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Unknown => "Unknown",
        }
    }
}

/// A raw block of text extracted from a source file.
///
/// Produced by the loader, consumed by the chunker, never persisted.
#[derive(Debug, Clone)]
pub struct RawTextBlock {
    /// Extracted text content
    pub text: String,
    /// Name of the file the text came from
    pub source_file_name: String,
    /// Detected file type
    pub file_type: FileType,
}

impl RawTextBlock {
    /// Create a new raw text block
    pub fn new(text: String, source_file_name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            text,
            source_file_name: source_file_name.into(),
            file_type,
        }
    }
}

/// A retrievable passage of text derived from a source document.
///
/// Immutable once created; `chunk_index` is 0-based insertion order within
/// the source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Text content
    pub text: String,
    /// Name of the source file (attribution only, never embedded)
    pub source_file_name: String,
    /// Chunk index within the source document
    pub chunk_index: u32,
    /// Parent document ID, when the chunk came through the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_doc_id: Option<Uuid>,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(text: String, source_file_name: impl Into<String>, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            source_file_name: source_file_name.into(),
            chunk_index,
            parent_doc_id: None,
        }
    }

    /// Attach the parent document ID
    pub fn with_parent(mut self, doc_id: Uuid) -> Self {
        self.parent_doc_id = Some(doc_id);
        self
    }
}

/// A document that has been ingested (registry record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Original filename as uploaded
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// Content hash (observability only; never used to deduplicate)
    pub content_hash: String,
    /// Number of chunks created from this document
    pub total_chunks: u32,
    /// File size in bytes
    pub file_size: u64,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document record
    pub fn new(filename: String, file_type: FileType, content_hash: String, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            file_type,
            content_hash,
            total_chunks: 0,
            file_size,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// Hash content for the registry record
pub fn hash_content(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_filename("report.TXT"), FileType::Text);
        assert_eq!(FileType::from_filename("notes.md"), FileType::Markdown);
        assert_eq!(FileType::from_filename("data.json"), FileType::Json);
        assert_eq!(FileType::from_filename("scan.pdf"), FileType::Pdf);
        assert_eq!(FileType::from_filename("memo.docx"), FileType::Docx);
        assert_eq!(FileType::from_filename("archive.tar.gz"), FileType::Unknown);
        assert_eq!(FileType::from_filename("Makefile"), FileType::Unknown);
    }

    #[test]
    fn test_chunk_parent() {
        let doc_id = Uuid::new_v4();
        let chunk = Chunk::new("hello".into(), "a.txt", 0).with_parent(doc_id);
        assert_eq!(chunk.parent_doc_id, Some(doc_id));
        assert_eq!(chunk.chunk_index, 0);
    }
}
