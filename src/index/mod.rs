//! Persistent vector index wrapping an HNSW graph
//!
//! Nearest-neighbor search is delegated to `hnsw_rs`; this module adds the
//! collection layer: entries carrying `(vector, text, metadata)`, snapshot
//! persistence, and reload across process restarts.

use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

/// A chunk stored in the index together with its embedding.
///
/// The embedding is computed once at insert time and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Unique entry ID
    pub id: Uuid,
    /// The indexed chunk
    pub chunk: Chunk,
    /// Embedding vector
    pub embedding: Vec<f32>,
}

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Similarity score (0.0-1.0, higher is better)
    pub similarity: f32,
}

/// On-disk snapshot format
#[derive(Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    dimensions: usize,
    entries: Vec<IndexedEntry>,
}

struct IndexInner {
    entries: Vec<IndexedEntry>,
    hnsw: Hnsw<'static, f32, DistCosine>,
}

/// Persistent vector collection with top-k cosine similarity search.
///
/// Insert-only: re-inserting content adds new entries rather than replacing
/// old ones. The snapshot on disk and the in-memory state agree after every
/// `persist` call.
pub struct VectorIndex {
    dir: PathBuf,
    collection: String,
    dimensions: usize,
    hnsw_m: usize,
    hnsw_ef_construction: usize,
    hnsw_ef_search: usize,
    hnsw_max_elements: usize,
    inner: RwLock<IndexInner>,
}

impl VectorIndex {
    /// Open the collection under `config.storage_path`, loading an existing
    /// snapshot if one is present. When no snapshot exists a new empty
    /// collection is created and persisted immediately, so the on-disk
    /// layout is established deterministically on first run. A snapshot
    /// that exists but cannot be read is an error; see `create`.
    pub fn open(config: &VectorDbConfig, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(&config.storage_path)?;

        let index = Self::empty(config, dimensions);

        let snapshot_path = index.snapshot_path();
        if snapshot_path.exists() {
            let entries = index.load_snapshot(&snapshot_path)?;
            tracing::info!(
                "Loaded vector collection '{}' with {} entries from {}",
                index.collection,
                entries.len(),
                snapshot_path.display()
            );
            let hnsw = index.rebuild_graph(&entries);
            *index.inner.write() = IndexInner { entries, hnsw };
        } else {
            tracing::info!(
                "Creating new vector collection '{}' at {}",
                index.collection,
                snapshot_path.display()
            );
            index.persist()?;
        }

        Ok(index)
    }

    /// Create a fresh empty collection, ignoring any snapshot already on
    /// disk, and persist it immediately. Used when loading an existing
    /// snapshot has failed for good.
    pub fn create(config: &VectorDbConfig, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(&config.storage_path)?;

        let index = Self::empty(config, dimensions);
        index.persist()?;
        Ok(index)
    }

    fn empty(config: &VectorDbConfig, dimensions: usize) -> Self {
        Self {
            dir: config.storage_path.clone(),
            collection: config.collection.clone(),
            dimensions,
            hnsw_m: config.hnsw_m,
            hnsw_ef_construction: config.hnsw_ef_construction,
            hnsw_ef_search: config.hnsw_ef_search,
            hnsw_max_elements: config.hnsw_max_elements,
            inner: RwLock::new(IndexInner {
                entries: Vec::new(),
                hnsw: Hnsw::new(
                    config.hnsw_m,
                    config.hnsw_max_elements,
                    16,
                    config.hnsw_ef_construction,
                    DistCosine {},
                ),
            }),
        }
    }

    fn rebuild_graph(&self, entries: &[IndexedEntry]) -> Hnsw<'static, f32, DistCosine> {
        let hnsw = Hnsw::new(
            self.hnsw_m,
            self.hnsw_max_elements,
            16,
            self.hnsw_ef_construction,
            DistCosine {},
        );
        for (position, entry) in entries.iter().enumerate() {
            hnsw.insert((&entry.embedding, position));
        }
        hnsw
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.collection))
    }

    fn load_snapshot(&self, path: &Path) -> Result<Vec<IndexedEntry>> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| Error::VectorIndex(format!("Corrupt snapshot: {}", e)))?;

        if snapshot.dimensions != self.dimensions {
            return Err(Error::VectorIndex(format!(
                "Snapshot dimensions {} do not match configured dimensions {}",
                snapshot.dimensions, self.dimensions
            )));
        }

        Ok(snapshot.entries)
    }

    /// Insert a chunk with its embedding. The entry becomes searchable
    /// immediately; call `persist` to make it durable.
    pub fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<Uuid> {
        if chunk.text.is_empty() || chunk.source_file_name.is_empty() {
            return Err(Error::VectorIndex(
                "Entry must carry non-empty text and source file name".to_string(),
            ));
        }
        if embedding.len() != self.dimensions {
            return Err(Error::VectorIndex(format!(
                "Embedding has {} dimensions, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let entry = IndexedEntry {
            id: Uuid::new_v4(),
            chunk,
            embedding,
        };
        let id = entry.id;

        let mut inner = self.inner.write();
        let position = inner.entries.len();
        inner.hnsw.insert((&entry.embedding, position));
        inner.entries.push(entry);

        Ok(id)
    }

    /// Search for the `top_k` most similar entries
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if query_embedding.len() != self.dimensions {
            return Err(Error::VectorIndex(format!(
                "Query has {} dimensions, index expects {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        let inner = self.inner.read();
        if inner.entries.is_empty() {
            return Ok(Vec::new());
        }

        let ef = self.hnsw_ef_search.max(top_k);
        let query = query_embedding.to_vec();
        let neighbours = inner.hnsw.search(&query, top_k, ef);

        let mut hits = Vec::with_capacity(neighbours.len());
        for neighbour in neighbours {
            if let Some(entry) = inner.entries.get(neighbour.d_id) {
                // Cosine distance in [0, 2] mapped onto a 0-1 similarity
                let similarity = 1.0 - neighbour.distance.min(2.0) / 2.0;
                hits.push(SearchHit {
                    chunk: entry.chunk.clone(),
                    similarity,
                });
            }
        }

        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        hits.truncate(top_k);

        Ok(hits)
    }

    /// Remove all entries belonging to a document; rebuilds the graph.
    /// Returns the number of entries removed.
    pub fn delete_by_document(&self, doc_id: &Uuid) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|entry| entry.chunk.parent_doc_id.as_ref() != Some(doc_id));
        let removed = before - inner.entries.len();

        if removed > 0 {
            let rebuilt = self.rebuild_graph(&inner.entries);
            inner.hnsw = rebuilt;
        }

        Ok(removed)
    }

    /// Number of entries in the collection
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the snapshot to disk. The write goes through a temp file and an
    /// atomic rename, so a crash mid-persist leaves the previous snapshot.
    pub fn persist(&self) -> Result<()> {
        let snapshot = {
            let inner = self.inner.read();
            Snapshot {
                collection: self.collection.clone(),
                dimensions: self.dimensions,
                entries: inner.entries.clone(),
            }
        };

        let path = self.snapshot_path();
        let tmp_path = self.dir.join(format!("{}.json.tmp", self.collection));
        let content = serde_json::to_string(&snapshot)?;
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &path)?;

        tracing::debug!(
            "Persisted collection '{}' ({} entries)",
            self.collection,
            snapshot.entries.len()
        );
        Ok(())
    }

    /// Collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Storage directory
    pub fn persist_dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorDbConfig;
    use crate::types::Chunk;

    fn test_config(dir: &Path) -> VectorDbConfig {
        VectorDbConfig {
            storage_path: dir.to_path_buf(),
            ..VectorDbConfig::default()
        }
    }

    fn unit_vec(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_open_creates_snapshot_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let index = VectorIndex::open(&config, 4).unwrap();

        assert!(index.is_empty());
        assert!(dir.path().join("corporate_docs.json").exists());
    }

    #[test]
    fn test_insert_search_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        {
            let index = VectorIndex::open(&config, 4).unwrap();
            index
                .insert(Chunk::new("alpha".into(), "a.txt", 0), unit_vec(4, 0))
                .unwrap();
            index
                .insert(Chunk::new("beta".into(), "b.txt", 0), unit_vec(4, 1))
                .unwrap();
            index.persist().unwrap();

            let hits = index.search(&unit_vec(4, 0), 2).unwrap();
            assert_eq!(hits[0].chunk.text, "alpha");
            assert!(hits[0].similarity > hits[1].similarity);
        }

        // Fresh process pointed at the same directory sees the same entries
        let reopened = VectorIndex::open(&config, 4).unwrap();
        assert_eq!(reopened.len(), 2);
        let hits = reopened.search(&unit_vec(4, 1), 1).unwrap();
        assert_eq!(hits[0].chunk.text, "beta");
    }

    #[test]
    fn test_insert_rejects_empty_text_and_bad_dims() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&test_config(dir.path()), 4).unwrap();

        assert!(index
            .insert(Chunk::new("".into(), "a.txt", 0), unit_vec(4, 0))
            .is_err());
        assert!(index
            .insert(Chunk::new("text".into(), "a.txt", 0), unit_vec(3, 0))
            .is_err());
    }

    #[test]
    fn test_reingest_accumulates_entries() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&test_config(dir.path()), 4).unwrap();

        for _ in 0..2 {
            index
                .insert(Chunk::new("same text".into(), "a.txt", 0), unit_vec(4, 0))
                .unwrap();
        }
        // No dedup: identical content is stored twice
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_delete_by_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let index = VectorIndex::open(&config, 4).unwrap();

        let doc_id = Uuid::new_v4();
        index
            .insert(
                Chunk::new("keep".into(), "keep.txt", 0),
                unit_vec(4, 0),
            )
            .unwrap();
        index
            .insert(
                Chunk::new("drop".into(), "drop.txt", 0).with_parent(doc_id),
                unit_vec(4, 1),
            )
            .unwrap();
        index
            .insert(
                Chunk::new("drop too".into(), "drop.txt", 1).with_parent(doc_id),
                unit_vec(4, 2),
            )
            .unwrap();

        let removed = index.delete_by_document(&doc_id).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.len(), 1);

        let hits = index.search(&unit_vec(4, 0), 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "keep");
    }

    #[test]
    fn test_dimension_mismatch_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        {
            let index = VectorIndex::open(&config, 4).unwrap();
            index.persist().unwrap();
        }

        assert!(VectorIndex::open(&config, 8).is_err());
    }
}
