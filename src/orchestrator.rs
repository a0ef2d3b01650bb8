//! Document lifecycle orchestration.
//!
//! The orchestrator owns the registry, the vector store, the processor, and
//! the worker pool, and wires them into the upload/search/delete operations
//! the service boundary exposes. Uploads are acknowledged immediately with a
//! pending registry record; a background worker then runs extraction,
//! chunking, and embedding, and the registry's `processingStatus` tracks the
//! outcome.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::extract::{FileKind, ALLOWED_EXTENSIONS};
use crate::index::IndexBackend;
use crate::models::{Document, ProcessingStatus, SearchResult};
use crate::processor::DocumentProcessor;
use crate::registry::DocumentRegistry;
use crate::store::VectorStore;
use crate::worker::WorkerPool;

/// Rejections the caller can correct. The service boundary downcasts to
/// this type to pick a client-error status instead of a 500.
#[derive(Debug)]
pub enum RequestError {
    UnsupportedFileType(String),
    EmptyQuery,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::UnsupportedFileType(name) => write!(
                f,
                "unsupported file type: {} (supported: {})",
                name,
                ALLOWED_EXTENSIONS.join(", ")
            ),
            RequestError::EmptyQuery => write!(f, "query must not be empty"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Immediate response to an upload; processing continues in the background.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub document_id: String,
    pub status: String,
    pub message: String,
}

/// Counts reported by the status endpoint and CLI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub documents_count: usize,
    pub chunks_count: usize,
    pub embedding_model: String,
}

pub struct DocumentOrchestrator {
    config: Config,
    processor: Arc<DocumentProcessor>,
    store: Arc<RwLock<VectorStore>>,
    registry: Arc<RwLock<DocumentRegistry>>,
    pool: WorkerPool,
}

impl DocumentOrchestrator {
    /// Builds the full pipeline from configuration, creating the embedding
    /// provider the config names.
    pub fn from_config(config: Config) -> Result<Arc<Self>> {
        let provider = create_provider(&config.embedding)?;
        Self::with_provider(config, provider)
    }

    /// Builds the pipeline around an existing provider. Runs the startup
    /// orphan check: a completed document with no chunks in the store lost
    /// its vectors (for example to a discarded stale index), so it is
    /// re-marked failed rather than left claiming chunks it does not have.
    pub fn with_provider(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<Self>> {
        let backend = IndexBackend::parse(&config.index.backend)?;
        let data_dir = config.storage.data_dir.clone();
        let store = VectorStore::open(&data_dir, backend, provider)?;
        let mut registry = DocumentRegistry::open(&data_dir)?;

        let indexed: std::collections::HashSet<String> =
            store.document_ids().into_iter().collect();
        let orphans: Vec<String> = registry
            .list()
            .iter()
            .filter(|d| {
                d.metadata.processing_status == ProcessingStatus::Completed
                    && d.metadata.chunk_count > 0
                    && !indexed.contains(&d.id)
            })
            .map(|d| d.id.clone())
            .collect();
        for id in orphans {
            tracing::warn!(document_id = %id, "completed document has no indexed chunks, marking failed");
            registry.mark_orphaned(&id)?;
        }

        let processor = DocumentProcessor::new(
            config.chunking.chunk_size_tokens,
            config.chunking.overlap_tokens,
        )?;
        let pool = WorkerPool::new(config.workers.count);

        Ok(Arc::new(Self {
            config,
            processor: Arc::new(processor),
            store: Arc::new(RwLock::new(store)),
            registry: Arc::new(RwLock::new(registry)),
            pool,
        }))
    }

    /// Registers an upload and schedules background processing. Rejects
    /// unsupported extensions before anything is recorded.
    pub async fn upload(self: &Arc<Self>, file_name: &str, bytes: Vec<u8>) -> Result<UploadReceipt> {
        let kind = file_kind(file_name)?;

        let document = Document::new(file_name, kind.as_str(), bytes.len() as u64);
        let document_id = document.id.clone();
        self.registry.write().await.insert(document)?;
        tracing::info!(document_id = %document_id, file_name, "upload accepted");

        let this = self.clone();
        let id = document_id.clone();
        let name = file_name.to_string();
        self.pool.spawn(async move {
            if let Err(e) = this.try_process(&id, &name, kind, &bytes).await {
                tracing::error!(document_id = %id, error = %e, "document processing failed");
                let mut registry = this.registry.write().await;
                if let Err(e) = registry.mark_failed(&id) {
                    tracing::error!(document_id = %id, error = %e, "could not record failure");
                }
            }
        });

        Ok(UploadReceipt {
            document_id,
            status: "processing-scheduled".to_string(),
            message: format!("{} accepted for processing", file_name),
        })
    }

    async fn try_process(
        &self,
        document_id: &str,
        file_name: &str,
        kind: FileKind,
        bytes: &[u8],
    ) -> Result<()> {
        self.registry
            .write()
            .await
            .set_status(document_id, ProcessingStatus::Processing)?;

        let processor = self.processor.clone();
        let owned_bytes = bytes.to_vec();
        let owned_name = file_name.to_string();
        let owned_id = document_id.to_string();
        let processed = tokio::task::spawn_blocking(move || {
            processor.process(&owned_bytes, &owned_name, kind, &owned_id)
        })
        .await
        .context("processing task panicked")??;

        self.store
            .write()
            .await
            .add_document(&processed.chunks)
            .await?;

        self.registry.write().await.record_processed(
            document_id,
            processed.content,
            processed.word_count,
            processed.chunk_count,
        )?;
        tracing::info!(
            document_id,
            chunks = processed.chunk_count,
            words = processed.word_count,
            "document processed"
        );
        Ok(())
    }

    /// Runs the whole pipeline inline and returns the finished record. Used
    /// by the CLI, where there is no later request to poll status from.
    pub async fn ingest(self: &Arc<Self>, file_name: &str, bytes: Vec<u8>) -> Result<Document> {
        let receipt = {
            let kind = file_kind(file_name)?;
            let document = Document::new(file_name, kind.as_str(), bytes.len() as u64);
            let id = document.id.clone();
            self.registry.write().await.insert(document)?;
            if let Err(e) = self.try_process(&id, file_name, kind, &bytes).await {
                let mut registry = self.registry.write().await;
                registry.mark_failed(&id).ok();
                return Err(e);
            }
            id
        };
        let registry = self.registry.read().await;
        registry
            .get(&receipt)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("document {} vanished after ingest", receipt))
    }

    /// Similarity search with per-request overrides falling back to the
    /// configured retrieval defaults.
    pub async fn search(
        &self,
        query: &str,
        max_results: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RequestError::EmptyQuery.into());
        }
        let max_results = max_results.unwrap_or(self.config.retrieval.max_results);
        let threshold = threshold.unwrap_or(self.config.retrieval.similarity_threshold);

        let started = Instant::now();
        let (chunks, scores) = self
            .store
            .read()
            .await
            .search(query, max_results, threshold)
            .await?;
        let processing_time = started.elapsed().as_secs_f64();
        tracing::debug!(
            query,
            results = chunks.len(),
            elapsed_secs = processing_time,
            "search served"
        );

        Ok(SearchResult {
            total_results: chunks.len(),
            query: query.to_string(),
            chunks,
            scores,
            processing_time,
        })
    }

    pub async fn list(&self) -> Vec<Document> {
        self.registry.read().await.list().to_vec()
    }

    pub async fn get(&self, document_id: &str) -> Option<Document> {
        self.registry.read().await.get(document_id).cloned()
    }

    /// Two-phase delete: vectors first, then the registry record, so an
    /// interruption can only leave a registry entry whose chunks are gone,
    /// which the startup orphan check repairs. Unknown ids succeed.
    pub async fn delete(&self, document_id: &str) -> Result<bool> {
        let removed_chunks = self.store.write().await.delete_document(document_id)?;
        let removed_doc = self.registry.write().await.remove(document_id)?;
        Ok(removed_doc || removed_chunks > 0)
    }

    /// Drops every document and every vector.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.write().await.clear_all()?;
        self.registry.write().await.clear()?;
        tracing::info!("cleared all documents and vectors");
        Ok(())
    }

    pub async fn status(&self) -> ServiceStatus {
        let store = self.store.read().await;
        let registry = self.registry.read().await;
        ServiceStatus {
            documents_count: registry.count(),
            chunks_count: store.chunk_count(),
            embedding_model: store.model_name().to_string(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn file_kind(file_name: &str) -> Result<FileKind> {
    FileKind::from_file_name(file_name)
        .ok_or_else(|| RequestError::UnsupportedFileType(file_name.to_string()).into())
}
