//! Query pipeline: retrieve, assemble context, generate, attribute sources

use std::sync::Arc;

use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::index::{SearchHit, VectorIndex};
use crate::providers::{EmbeddingProvider, GenerationProvider};
use crate::retry::RetryPolicy;
use crate::types::QueryOutcome;

/// How many retrieved chunks go into the prompt context. Retrieval may
/// return more (`top_k`); the context stays bounded regardless.
const CONTEXT_CHUNKS: usize = 3;

/// Retrieval-augmented query pipeline.
///
/// Stateless per call; shares the vector index with the ingestion pipeline.
pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    generator: Arc<dyn GenerationProvider>,
    top_k: usize,
    retry: RetryPolicy,
}

impl QueryPipeline {
    /// Create a new query pipeline
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        generator: Arc<dyn GenerationProvider>,
        top_k: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            top_k,
            retry,
        }
    }

    /// Answer a question from the knowledge base.
    ///
    /// Never propagates an error: validation failures and internal failures
    /// both come back as a `QueryOutcome` with the `error` field set.
    pub async fn query(&self, question: &str) -> QueryOutcome {
        if question.trim().is_empty() {
            return QueryOutcome::invalid("question must not be empty");
        }

        match self.run_query(question).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Error answering question \"{}\": {}", question, e);
                QueryOutcome::failed(e.to_string())
            }
        }
    }

    async fn run_query(&self, question: &str) -> Result<QueryOutcome> {
        let hits = self.retrieve(question).await?;

        let context = Self::assemble_context(&hits);
        let prompt = if context.is_empty() {
            tracing::info!("No relevant chunks for \"{}\", using general prompt", question);
            PromptBuilder::general(question)
        } else {
            PromptBuilder::grounded(&context, question)
        };

        let answer = self.generator.generate(&prompt).await?;

        Ok(QueryOutcome {
            answer,
            sources_used: hits.len(),
            source_previews: hits
                .iter()
                .take(CONTEXT_CHUNKS)
                .map(|hit| hit.chunk.source_file_name.clone())
                .collect(),
            context_length: context.len(),
            error: None,
        })
    }

    /// Retrieve the top-k most similar chunks for a question (retried)
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchHit>> {
        self.retry
            .run("retrieval", || async {
                let embedding = self.embedder.embed(question).await?;
                self.index.search(&embedding, self.top_k)
            })
            .await
    }

    /// Concatenate the top-ranked chunks, rank order preserved, separated by
    /// blank lines.
    pub fn assemble_context(hits: &[SearchHit]) -> String {
        hits.iter()
            .take(CONTEXT_CHUNKS)
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
