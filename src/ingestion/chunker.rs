//! Text chunking with a semantic and a fixed-size strategy

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, RawTextBlock};

/// Chunking strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategyKind {
    /// Split at embedding-similarity breakpoints between sentence groups
    #[default]
    Semantic,
    /// Fixed-size chunks with overlap, respecting sentence boundaries
    Fixed,
}

/// Splits raw text blocks into retrievable chunks.
///
/// The semantic strategy costs one embedding call per sentence group and
/// targets few, topically coherent chunks; the fixed strategy is cheap and
/// size-bounded. Chunk metadata (file name, index) is attribution only and
/// is never part of the embedded text.
pub struct Chunker {
    strategy: ChunkStrategyKind,
    buffer_size: usize,
    breakpoint_percentile: f64,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            strategy: config.strategy,
            buffer_size: config.buffer_size.max(1),
            breakpoint_percentile: config.breakpoint_percentile,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }

    /// Split a raw text block into chunks.
    ///
    /// Never fails: when semantic splitting cannot run (embedding provider
    /// unavailable) the entire block becomes a single chunk, and the
    /// fallback is logged.
    pub async fn split(
        &self,
        block: &RawTextBlock,
        embedder: &dyn EmbeddingProvider,
    ) -> Vec<Chunk> {
        if block.text.trim().is_empty() {
            return Vec::new();
        }

        match self.strategy {
            ChunkStrategyKind::Semantic => match self.split_semantic(block, embedder).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(
                        "Semantic splitting failed for '{}': {}, falling back to a single chunk",
                        block.source_file_name,
                        e
                    );
                    vec![Self::whole_block_chunk(block)]
                }
            },
            ChunkStrategyKind::Fixed => self.split_fixed(block),
        }
    }

    /// The whole block as one chunk (index 0)
    fn whole_block_chunk(block: &RawTextBlock) -> Chunk {
        Chunk::new(block.text.trim().to_string(), &block.source_file_name, 0)
    }

    /// Semantic splitting: embed consecutive sentence groups, measure cosine
    /// distance between adjacent groups, and insert a boundary wherever the
    /// distance exceeds the configured percentile of observed distances.
    async fn split_semantic(
        &self,
        block: &RawTextBlock,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<Chunk>> {
        let sentences = Self::split_into_sentences(&block.text);

        if sentences.len() <= 1 {
            return Ok(vec![Self::whole_block_chunk(block)]);
        }

        let groups: Vec<String> = (0..sentences.len())
            .map(|i| {
                let end = (i + self.buffer_size).min(sentences.len());
                sentences[i..end].concat()
            })
            .collect();

        let embeddings = embedder.embed_batch(&groups).await?;

        let distances: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| cosine_distance(&pair[0], &pair[1]))
            .collect();
        let threshold = percentile(&distances, self.breakpoint_percentile);

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut chunk_index = 0u32;

        for (i, sentence) in sentences.iter().enumerate() {
            current.push_str(sentence);

            let at_boundary = i < distances.len() && distances[i] > threshold;
            if at_boundary && !current.trim().is_empty() {
                chunks.push(Chunk::new(
                    current.trim().to_string(),
                    &block.source_file_name,
                    chunk_index,
                ));
                chunk_index += 1;
                current.clear();
            }
        }

        if !current.trim().is_empty() {
            chunks.push(Chunk::new(
                current.trim().to_string(),
                &block.source_file_name,
                chunk_index,
            ));
        }

        Ok(chunks)
    }

    /// Fixed-size splitting: accumulate sentences up to `chunk_size`
    /// characters, carrying `chunk_overlap` characters into the next chunk.
    fn split_fixed(&self, block: &RawTextBlock) -> Vec<Chunk> {
        let sentences = Self::split_into_sentences(&block.text);

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut chunk_index = 0u32;

        for sentence in sentences {
            if !current.is_empty() && current.len() + sentence.len() > self.chunk_size {
                if !current.trim().is_empty() {
                    chunks.push(Chunk::new(
                        current.trim().to_string(),
                        &block.source_file_name,
                        chunk_index,
                    ));
                    chunk_index += 1;
                }
                current = self.overlap_tail(&current);
            }
            current.push_str(sentence);
        }

        if !current.trim().is_empty() {
            chunks.push(Chunk::new(
                current.trim().to_string(),
                &block.source_file_name,
                chunk_index,
            ));
        }

        chunks
    }

    /// Split text into sentences using unicode sentence boundaries
    fn split_into_sentences(text: &str) -> Vec<&str> {
        text.split_sentence_bounds().collect()
    }

    /// Get the overlap carried from the end of a finished chunk
    fn overlap_tail(&self, text: &str) -> String {
        if self.chunk_overlap == 0 {
            return String::new();
        }
        if text.len() <= self.chunk_overlap {
            return text.to_string();
        }

        let mut start = text.len() - self.chunk_overlap;
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }
        let tail = &text[start..];

        // Prefer starting the overlap at a word boundary
        match tail.find(' ') {
            Some(pos) => tail[pos + 1..].to_string(),
            None => tail.to_string(),
        }
    }
}

/// Cosine distance between two vectors (0 = identical direction)
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Linearly-interpolated percentile of a set of observed distances
fn percentile(values: &[f32], p: f64) -> f32 {
    debug_assert!(!values.is_empty());

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;

    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
