//! Core data models used throughout semdex.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the processing and retrieval pipeline. Field names serialize in
//! camelCase, matching the HTTP API and the on-disk registry format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an uploaded document.
///
/// Transitions are forward-only: `Pending → Processing → Completed | Failed`.
/// Terminal states are never revisited; the single exception is the startup
/// orphan-recovery rule, which may re-mark a `Completed` document as `Failed`
/// when none of its chunks exist in the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    /// Whether a normal transition from `self` to `next` is allowed.
    pub fn can_advance_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-document metadata filled in by the background processing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub file_size_bytes: u64,
    pub word_count: usize,
    pub chunk_count: usize,
    pub processing_status: ProcessingStatus,
}

/// A registered document. `content` stays empty until processing completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub content: String,
    pub file_type: String,
    pub upload_date: DateTime<Utc>,
    pub metadata: DocumentMeta,
    pub is_active: bool,
}

impl Document {
    /// Creates a pending document record at upload time.
    pub fn new(file_name: &str, file_type: &str, file_size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            content: String::new(),
            file_type: file_type.to_string(),
            upload_date: Utc::now(),
            metadata: DocumentMeta {
                file_size_bytes,
                word_count: 0,
                chunk_count: 0,
                processing_status: ProcessingStatus::Pending,
            },
            is_active: true,
        }
    }
}

/// Char span and token count of a chunk within its document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub start_char: usize,
    pub end_char: usize,
    pub token_count: usize,
}

/// A bounded, token-sized slice of a document's text; the unit of embedding
/// and retrieval. Chunk indices are contiguous and 0-based per document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Vec<f32>>,
    pub metadata: ChunkMeta,
}

/// Ranked result of a similarity query: chunks and their scores run in
/// parallel, ordered by descending similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub chunks: Vec<Chunk>,
    pub scores: Vec<f32>,
    pub query: String,
    pub total_results: usize,
    /// Seconds spent serving the query.
    pub processing_time: f64,
}
