//! End-to-end tests for the ingest -> query flow with stub providers

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use corpdoc_rag::config::{ChunkingConfig, VectorDbConfig};
use corpdoc_rag::error::Result;
use corpdoc_rag::index::VectorIndex;
use corpdoc_rag::ingestion::{Chunker, IngestPipeline};
use corpdoc_rag::providers::{GenerationProvider, MockEmbedder};
use corpdoc_rag::retrieval::QueryPipeline;
use corpdoc_rag::retry::RetryPolicy;

/// Generation provider that records prompts and returns a canned answer
struct StubGenerator {
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerationProvider for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok("stub answer".to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub"
    }
}

struct Harness {
    ingest: IngestPipeline,
    query: QueryPipeline,
    index: Arc<VectorIndex>,
    generator: Arc<StubGenerator>,
}

fn harness(dir: &Path) -> Harness {
    let vector_db = VectorDbConfig {
        storage_path: dir.to_path_buf(),
        ..VectorDbConfig::default()
    };
    let dimensions = 128;
    let index = Arc::new(VectorIndex::open(&vector_db, dimensions).unwrap());
    let embedder = Arc::new(MockEmbedder::new(dimensions));
    let generator = StubGenerator::new();

    let ingest = IngestPipeline::new(
        Chunker::from_config(&ChunkingConfig::default()),
        embedder.clone(),
        index.clone(),
        3,
    );
    let query = QueryPipeline::new(
        embedder,
        index.clone(),
        generator.clone(),
        5,
        RetryPolicy::fixed(3, Duration::from_millis(1)),
    );

    Harness {
        ingest,
        query,
        index,
        generator,
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{}", content).unwrap();
    path
}

#[tokio::test]
async fn test_ingested_file_is_attributed_in_query() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let path = write_file(
        dir.path(),
        "vacation.txt",
        "Employees accrue twenty five vacation days per calendar year.",
    );
    assert!(h.ingest.ingest_file(&path).await);

    let outcome = h
        .query
        .query("How many vacation days do employees accrue?")
        .await;

    assert!(outcome.error.is_none());
    assert!(outcome.sources_used >= 1);
    assert!(outcome
        .source_previews
        .iter()
        .any(|name| name == "vacation.txt"));
    assert!(outcome.context_length > 0);
}

#[tokio::test]
async fn test_json_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let path = write_file(
        dir.path(),
        "departments.json",
        r#"{"engineering": "builds the product", "support": "answers tickets"}"#,
    );
    assert!(h.ingest.ingest_file(&path).await);

    let outcome = h.query.query("Who answers support tickets?").await;
    assert!(outcome
        .source_previews
        .iter()
        .any(|name| name == "departments.json"));
}

#[tokio::test]
async fn test_blank_questions_reach_neither_retrieval_nor_generation() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    for question in ["", "   ", "\n\t"] {
        let outcome = h.query.query(question).await;
        assert!(outcome.error.is_some());
    }

    assert!(h.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_repeated_ingest_grows_count_by_same_amount() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let path = write_file(
        dir.path(),
        "expenses.txt",
        "Travel expenses are reimbursed within thirty days of submission.",
    );

    assert!(h.ingest.ingest_file(&path).await);
    let first = h.index.len();
    assert!(first >= 1);

    assert!(h.ingest.ingest_file(&path).await);
    assert_eq!(h.index.len(), first * 2);

    assert!(h.ingest.ingest_file(&path).await);
    assert_eq!(h.index.len(), first * 3);
}

#[tokio::test]
async fn test_empty_knowledge_base_selects_general_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let outcome = h.query.query("What is the meaning of synergy?").await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.sources_used, 0);

    let prompts = h.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].contains("CONTEXT FROM THE COMPANY KNOWLEDGE BASE"));
}

#[tokio::test]
async fn test_two_topic_document_ranks_matching_chunk_first() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    // Three sentences, two topics: payroll vs. datacenter cooling
    let path = write_file(
        dir.path(),
        "mixed.txt",
        "Payroll runs on the last business day of the month. \
         Payroll questions go to the payroll helpdesk. \
         The datacenter cooling system uses redundant chillers.",
    );
    assert!(h.ingest.ingest_file(&path).await);
    assert!(h.index.len() >= 1);

    let hits = h
        .query
        .retrieve("How does the datacenter cooling system work?")
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(
        hits[0].chunk.text.contains("cooling"),
        "expected the cooling chunk first, got: {}",
        hits[0].chunk.text
    );
}

#[tokio::test]
async fn test_index_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let h = harness(dir.path());
        let path = write_file(
            dir.path(),
            "security.md",
            "Badge access requests are processed by the security office.",
        );
        assert!(h.ingest.ingest_file(&path).await);
        assert!(h.index.len() >= 1);
    }

    // A fresh process pointed at the same directory sees the same data
    let h = harness(dir.path());
    assert!(h.index.len() >= 1);

    let outcome = h.query.query("Who processes badge access requests?").await;
    assert!(outcome
        .source_previews
        .iter()
        .any(|name| name == "security.md"));
}
