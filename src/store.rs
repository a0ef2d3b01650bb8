//! Vector store: embeddings, chunk metadata, and their on-disk artifacts.
//!
//! The store pairs a [`VectorIndex`] with a parallel list of chunk records.
//! A vector's position in the index is its insertion counter, and the record
//! at the same position describes it; deletion rebuilds both from the
//! survivors so positions stay contiguous. Two artifacts live under the data
//! directory: `index.bin` (raw vector matrix) and `metadata.json` (records
//! keyed by insertion counter). Both are written atomically via a temp file
//! and rename.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::index::{create_index, IndexBackend, VectorIndex};
use crate::models::{Chunk, ChunkMeta};

const INDEX_FILE: &str = "index.bin";
const METADATA_FILE: &str = "metadata.json";

/// `index.bin` layout: magic, dims as u32 LE, count as u64 LE, then
/// `count * dims` f32 LE values in row-major insertion order.
const INDEX_MAGIC: &[u8; 4] = b"SDX1";

/// The persisted description of one indexed chunk. Mirrors [`Chunk`] minus
/// the embedding, which lives in `index.bin` at the same position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub token_count: usize,
}

impl ChunkRecord {
    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            content: chunk.content.clone(),
            chunk_index: chunk.chunk_index,
            start_char: chunk.metadata.start_char,
            end_char: chunk.metadata.end_char,
            token_count: chunk.metadata.token_count,
        }
    }

    fn to_chunk(&self) -> Chunk {
        Chunk {
            id: self.chunk_id.clone(),
            document_id: self.document_id.clone(),
            content: self.content.clone(),
            chunk_index: self.chunk_index,
            embedding: None,
            metadata: ChunkMeta {
                start_char: self.start_char,
                end_char: self.end_char,
                token_count: self.token_count,
            },
        }
    }
}

/// Aggregate counts reported by status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub chunks_count: usize,
    pub documents_count: usize,
    pub embedding_model: String,
}

pub struct VectorStore {
    dir: PathBuf,
    backend: IndexBackend,
    index: Box<dyn VectorIndex>,
    records: Vec<ChunkRecord>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dir", &self.dir)
            .field("backend", &self.backend)
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Opens the store at `dir`, loading any persisted artifacts.
    ///
    /// A persisted index whose dimensionality differs from the provider's is
    /// a hard error. A count mismatch between the index and the metadata
    /// sidecar means one artifact is stale; the store logs it and starts
    /// empty rather than serve positions that point at the wrong chunk.
    pub fn open(
        dir: &Path,
        backend: IndexBackend,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;

        let dims = provider.dims();
        let mut index = create_index(backend, dims);
        let mut records = Vec::new();

        let index_path = dir.join(INDEX_FILE);
        let metadata_path = dir.join(METADATA_FILE);
        if index_path.exists() && metadata_path.exists() {
            let vectors = load_index_file(&index_path, dims)?;
            let loaded = load_metadata_file(&metadata_path)?;
            if vectors.len() != loaded.len() {
                tracing::error!(
                    index_vectors = vectors.len(),
                    metadata_records = loaded.len(),
                    "index and metadata disagree, starting with an empty store"
                );
            } else {
                index.add_batch(&vectors)?;
                records = loaded;
                tracing::info!(
                    chunks = records.len(),
                    backend = backend.as_str(),
                    "loaded vector store"
                );
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            backend,
            index,
            records,
            provider,
        })
    }

    pub fn backend(&self) -> IndexBackend {
        self.backend
    }

    pub fn chunk_count(&self) -> usize {
        self.records.len()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Distinct document ids currently indexed, in first-seen order.
    pub fn document_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        for record in &self.records {
            if seen.insert(record.document_id.as_str()) {
                ids.push(record.document_id.clone());
            }
        }
        ids
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            chunks_count: self.chunk_count(),
            documents_count: self.document_ids().len(),
            embedding_model: self.provider.model_name().to_string(),
        }
    }

    /// Embeds and indexes a document's chunks, then persists. Returns the
    /// number of chunks added. An empty chunk list is a no-op.
    pub async fn add_document(&mut self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut vectors = self.provider.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            bail!(
                "embedding count mismatch: {} texts, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        for v in &mut vectors {
            if v.len() != self.index.dims() {
                bail!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.index.dims(),
                    v.len()
                );
            }
            l2_normalize(v);
        }

        self.index.add_batch(&vectors)?;
        self.records.extend(chunks.iter().map(ChunkRecord::from_chunk));
        self.persist()?;
        Ok(chunks.len())
    }

    /// Similarity search. Returns up to `max_results` chunks whose score
    /// meets `threshold`, highest first, with scores in a parallel vector.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        threshold: f32,
    ) -> Result<(Vec<Chunk>, Vec<f32>)> {
        if self.records.is_empty() || max_results == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut query_vecs = self.provider.embed(&[query.to_string()]).await?;
        let Some(query_vec) = query_vecs.first_mut() else {
            bail!("embedding provider returned no vector for query");
        };
        l2_normalize(query_vec);

        let hits = self.index.search(query_vec, max_results)?;
        let mut chunks = Vec::new();
        let mut scores = Vec::new();
        for (position, score) in hits {
            if score < threshold {
                continue;
            }
            let Some(record) = self.records.get(position) else {
                bail!("index position {} has no metadata record", position);
            };
            chunks.push(record.to_chunk());
            scores.push(score);
        }
        Ok((chunks, scores))
    }

    /// Removes every chunk of `document_id` by rebuilding the index from the
    /// survivors. Returns the number of chunks removed; zero means nothing
    /// matched and nothing was touched on disk.
    pub fn delete_document(&mut self, document_id: &str) -> Result<usize> {
        let removed = self
            .records
            .iter()
            .filter(|r| r.document_id == document_id)
            .count();
        if removed == 0 {
            return Ok(0);
        }

        let mut survivors = Vec::with_capacity(self.records.len() - removed);
        let mut vectors = Vec::with_capacity(self.records.len() - removed);
        for (position, record) in self.records.iter().enumerate() {
            if record.document_id == document_id {
                continue;
            }
            let Some(vector) = self.index.get(position) else {
                bail!("record at position {} has no vector", position);
            };
            survivors.push(record.clone());
            vectors.push(vector);
        }

        let mut index = create_index(self.backend, self.index.dims());
        index.add_batch(&vectors)?;
        self.index = index;
        self.records = survivors;
        self.persist()?;
        tracing::info!(document_id, removed, "deleted document from vector store");
        Ok(removed)
    }

    /// Drops every vector and record, and persists the empty state.
    pub fn clear_all(&mut self) -> Result<()> {
        self.index.clear();
        self.records.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let mut buf = Vec::with_capacity(
            INDEX_MAGIC.len() + 12 + self.records.len() * self.index.dims() * 4,
        );
        buf.extend_from_slice(INDEX_MAGIC);
        buf.extend_from_slice(&(self.index.dims() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.index.len() as u64).to_le_bytes());
        for position in 0..self.index.len() {
            let Some(vector) = self.index.get(position) else {
                bail!("index position {} missing during persist", position);
            };
            for value in vector {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        write_atomic(&self.dir.join(INDEX_FILE), &buf)?;

        let keyed: BTreeMap<u64, &ChunkRecord> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (i as u64, r))
            .collect();
        let json = serde_json::to_vec_pretty(&keyed)?;
        write_atomic(&self.dir.join(METADATA_FILE), &json)?;
        Ok(())
    }
}

/// Writes `bytes` to a sibling temp file and renames it over `path`, so a
/// crash mid-write never leaves a torn artifact.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} into place", tmp.display()))?;
    Ok(())
}

fn load_index_file(path: &Path, expected_dims: usize) -> Result<Vec<Vec<f32>>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() < INDEX_MAGIC.len() + 12 {
        bail!("index file {} is truncated", path.display());
    }
    if &bytes[..4] != INDEX_MAGIC {
        bail!("index file {} has an unrecognized format", path.display());
    }

    let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if dims != expected_dims {
        bail!(
            "index dimensionality {} does not match the embedding model's {}",
            dims,
            expected_dims
        );
    }
    let count = u64::from_le_bytes([
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ]) as usize;

    let body = &bytes[16..];
    let expected_len = count
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| anyhow::anyhow!("index header overflows"))?;
    if body.len() != expected_len {
        bail!(
            "index file {} body is {} bytes, expected {}",
            path.display(),
            body.len(),
            expected_len
        );
    }

    let mut vectors = Vec::with_capacity(count);
    for row in 0..count {
        let start = row * dims * 4;
        let mut vector = Vec::with_capacity(dims);
        for col in 0..dims {
            let offset = start + col * 4;
            vector.push(f32::from_le_bytes([
                body[offset],
                body[offset + 1],
                body[offset + 2],
                body[offset + 3],
            ]));
        }
        vectors.push(vector);
    }
    Ok(vectors)
}

fn load_metadata_file(path: &Path) -> Result<Vec<ChunkRecord>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let keyed: BTreeMap<u64, ChunkRecord> =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    // BTreeMap iteration restores insertion-counter order.
    Ok(keyed.into_values().collect())
}
