//! Document registry: lifecycle records persisted to `documents.json`.
//!
//! The registry is the source of truth for which documents exist and where
//! each one is in the `pending -> processing -> completed | failed` pipeline.
//! Every mutation is saved atomically before returning, so a restart sees
//! the last acknowledged state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::models::{Document, ProcessingStatus};
use crate::store::write_atomic;

const REGISTRY_FILE: &str = "documents.json";

pub struct DocumentRegistry {
    path: PathBuf,
    documents: Vec<Document>,
}

impl DocumentRegistry {
    /// Opens the registry under `dir`; a missing file means no documents.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
        let path = dir.join(REGISTRY_FILE);
        let documents = if path.exists() {
            let bytes =
                fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self { path, documents })
    }

    pub fn count(&self) -> usize {
        self.documents.len()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// All documents in upload order.
    pub fn list(&self) -> &[Document] {
        &self.documents
    }

    pub fn insert(&mut self, document: Document) -> Result<()> {
        if self.get(&document.id).is_some() {
            bail!("document {} already registered", document.id);
        }
        self.documents.push(document);
        self.save()
    }

    /// Removes the document if present. Returns whether anything was
    /// removed; removing an unknown id succeeds without touching disk.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.documents.len();
        self.documents.retain(|d| d.id != id);
        if self.documents.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Advances a document's status, enforcing the forward-only lifecycle.
    pub fn set_status(&mut self, id: &str, next: ProcessingStatus) -> Result<()> {
        let doc = self.get_mut(id)?;
        let current = doc.metadata.processing_status;
        if !current.can_advance_to(next) {
            bail!("document {} cannot move from {} to {}", id, current, next);
        }
        doc.metadata.processing_status = next;
        self.save()
    }

    /// Records the outcome of successful processing and marks the document
    /// completed.
    pub fn record_processed(
        &mut self,
        id: &str,
        content: String,
        word_count: usize,
        chunk_count: usize,
    ) -> Result<()> {
        let doc = self.get_mut(id)?;
        let current = doc.metadata.processing_status;
        if !current.can_advance_to(ProcessingStatus::Completed) {
            bail!(
                "document {} cannot move from {} to completed",
                id,
                current
            );
        }
        doc.content = content;
        doc.metadata.word_count = word_count;
        doc.metadata.chunk_count = chunk_count;
        doc.metadata.processing_status = ProcessingStatus::Completed;
        self.save()
    }

    /// Marks a document failed from any non-terminal state.
    pub fn mark_failed(&mut self, id: &str) -> Result<()> {
        let doc = self.get_mut(id)?;
        if doc.metadata.processing_status.is_terminal() {
            bail!(
                "document {} is already {}",
                id,
                doc.metadata.processing_status
            );
        }
        doc.metadata.processing_status = ProcessingStatus::Failed;
        self.save()
    }

    /// Startup recovery: a completed document with no chunks in the vector
    /// store lost its vectors, so its completed status is a lie. This is the
    /// one sanctioned re-marking of a terminal state.
    pub fn mark_orphaned(&mut self, id: &str) -> Result<()> {
        let doc = self.get_mut(id)?;
        if doc.metadata.processing_status != ProcessingStatus::Completed {
            bail!(
                "document {} is {}, not completed",
                id,
                doc.metadata.processing_status
            );
        }
        doc.metadata.processing_status = ProcessingStatus::Failed;
        self.save()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.documents.clear();
        self.save()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Document> {
        self.documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow::anyhow!("document {} not found", id))
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.documents)?;
        write_atomic(&self.path, &json)
    }
}
