//! File-backed vector store — one JSONL partition file per corpus tag.
//!
//! Each line is a JSON-encoded [`Chunk`] carrying its embedding. Partitions
//! are loaded whole on every query; the corpus is two flat documents, so
//! there is nothing to page.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taskhelm_core::error::RetrievalError;
use tracing::{debug, warn};

/// An embedded passage of a source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique ID for this chunk
    pub id: String,

    /// The passage text
    pub text: String,

    /// Partition tag ("documentation" | "cookbook")
    pub tag: String,

    /// Embedding vector
    pub embedding: Vec<f32>,
}

/// A directory of JSONL partition files.
pub struct VectorStore {
    dir: PathBuf,
}

impl VectorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn partition_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{tag}.jsonl"))
    }

    /// Whether a partition file already exists (ingestion is idempotent
    /// when it does and reimport is not forced).
    pub fn partition_exists(&self, tag: &str) -> bool {
        self.partition_path(tag).is_file()
    }

    /// Whether the index directory is missing or holds no partitions.
    pub fn is_empty(&self) -> bool {
        match std::fs::read_dir(&self.dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    /// Replace a partition with the given chunks.
    pub fn write_partition(&self, tag: &str, chunks: &[Chunk]) -> Result<(), RetrievalError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| RetrievalError::Storage(format!("create index dir: {e}")))?;

        let mut content = String::new();
        for chunk in chunks {
            let line = serde_json::to_string(chunk)
                .map_err(|e| RetrievalError::Storage(format!("encode chunk: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        let path = self.partition_path(tag);
        std::fs::write(&path, content)
            .map_err(|e| RetrievalError::Storage(format!("write {}: {e}", path.display())))?;
        debug!(tag, count = chunks.len(), "Wrote index partition");
        Ok(())
    }

    /// Load all chunks of a partition. Corrupted lines are skipped.
    pub fn load_partition(&self, tag: &str) -> Result<Vec<Chunk>, RetrievalError> {
        let path = self.partition_path(tag);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RetrievalError::Storage(format!("read {}: {e}", path.display())))?;

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Chunk>(line) {
                Ok(chunk) => Some(chunk),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted index chunk");
                    None
                }
            })
            .collect())
    }

    /// Rank a partition's chunks against a query embedding, best first.
    pub fn rank(
        &self,
        tag: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<Chunk>, RetrievalError> {
        let mut scored: Vec<(f32, Chunk)> = self
            .load_partition(tag)?
            .into_iter()
            .map(|chunk| (cosine_similarity(query, &chunk.embedding), chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(top_k).map(|(_, c)| c).collect())
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero-length
/// inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Split a source document into paragraph chunks.
///
/// Paragraphs are blank-line separated; very short fragments are folded into
/// their predecessor so embeddings carry enough context.
pub fn chunk_document(text: &str) -> Vec<String> {
    const MIN_CHUNK_CHARS: usize = 80;

    let mut chunks: Vec<String> = Vec::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        match chunks.last_mut() {
            Some(last) if last.len() < MIN_CHUNK_CHARS => {
                last.push_str("\n\n");
                last.push_str(paragraph);
            }
            _ => chunks.push(paragraph.to_string()),
        }
    }
    chunks
}
