//! End-to-end pipeline tests over the orchestrator with a deterministic
//! embedding provider, so nothing here needs a model download or network.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use semdex::config::Config;
use semdex::embedding::{l2_normalize, EmbeddingProvider};
use semdex::models::{Document, ProcessingStatus};
use semdex::orchestrator::DocumentOrchestrator;
use semdex::registry::DocumentRegistry;

/// Folds each byte into a position-dependent bucket and normalizes. The
/// same text always embeds to the same unit vector, so an exact-content
/// query scores 1.0 against its own chunk.
struct StubProvider;

const DIMS: usize = 64;

#[async_trait]
impl EmbeddingProvider for StubProvider {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIMS];
                for (pos, byte) in t.bytes().enumerate() {
                    v[(byte as usize * 31 + pos) % DIMS] += 1.0;
                }
                l2_normalize(&mut v);
                v
            })
            .collect())
    }
}

fn orchestrator_in(dir: &std::path::Path) -> Arc<DocumentOrchestrator> {
    let config = Config::with_data_dir(dir);
    DocumentOrchestrator::with_provider(config, Arc::new(StubProvider)).unwrap()
}

async fn wait_until_terminal(
    orchestrator: &Arc<DocumentOrchestrator>,
    document_id: &str,
) -> Document {
    for _ in 0..250 {
        if let Some(doc) = orchestrator.get(document_id).await {
            if doc.metadata.processing_status.is_terminal() {
                return doc;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("document {} never reached a terminal status", document_id);
}

#[tokio::test]
async fn upload_processes_in_background_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());

    let receipt = orchestrator
        .upload(
            "notes.txt",
            b"The freight elevator is out of service. Use the north stairs.".to_vec(),
        )
        .await
        .unwrap();
    assert_eq!(receipt.status, "processing-scheduled");

    let doc = wait_until_terminal(&orchestrator, &receipt.document_id).await;
    assert_eq!(doc.metadata.processing_status, ProcessingStatus::Completed);
    assert_eq!(doc.metadata.chunk_count, 1);
    assert!(doc.metadata.word_count >= 10);
    assert_eq!(doc.file_name, "notes.txt");

    let status = orchestrator.status().await;
    assert_eq!(status.documents_count, 1);
    assert_eq!(status.chunks_count, 1);
    assert_eq!(status.embedding_model, "stub");
}

#[tokio::test]
async fn unsupported_extension_is_rejected_without_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());

    let err = orchestrator
        .upload("table.csv", b"a,b,c".to_vec())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unsupported file type"));
    assert!(orchestrator.list().await.is_empty());
}

#[tokio::test]
async fn unparseable_upload_ends_up_failed() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());

    let receipt = orchestrator
        .upload("broken.pdf", b"this is not a pdf".to_vec())
        .await
        .unwrap();
    let doc = wait_until_terminal(&orchestrator, &receipt.document_id).await;
    assert_eq!(doc.metadata.processing_status, ProcessingStatus::Failed);

    // Nothing of the failed document reaches the index.
    assert_eq!(orchestrator.status().await.chunks_count, 0);
}

#[tokio::test]
async fn exact_content_query_is_the_top_result() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());

    let doc = orchestrator
        .ingest(
            "facts.txt",
            b"Basalt is a volcanic rock. Granite forms from slow cooling magma.".to_vec(),
        )
        .await
        .unwrap();
    assert_eq!(doc.metadata.processing_status, ProcessingStatus::Completed);

    let result = orchestrator
        .search("Basalt is a volcanic rock Granite forms from slow cooling magma", None, None)
        .await
        .unwrap();
    assert_eq!(result.total_results, 1);
    assert_eq!(result.chunks[0].document_id, doc.id);
    assert!(result.scores[0] >= 0.7, "score too low: {}", result.scores[0]);
    assert!(result.processing_time >= 0.0);
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());
    let err = orchestrator.search("   ", None, None).await.unwrap_err();
    assert!(err.to_string().contains("must not be empty"));
}

#[tokio::test]
async fn delete_removes_document_from_search_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());

    let kept = orchestrator
        .ingest("kept.txt", b"Ravens remember human faces for years.".to_vec())
        .await
        .unwrap();
    let dropped = orchestrator
        .ingest("dropped.txt", b"Octopuses taste with their arms.".to_vec())
        .await
        .unwrap();

    assert!(orchestrator.delete(&dropped.id).await.unwrap());

    let result = orchestrator
        .search("Octopuses taste with their arms", None, Some(-1.0))
        .await
        .unwrap();
    assert!(
        result.chunks.iter().all(|c| c.document_id != dropped.id),
        "deleted document still searchable"
    );

    let listed = orchestrator.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept.id);
}

#[tokio::test]
async fn deleting_an_unknown_id_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());
    orchestrator
        .ingest("a.txt", b"Some indexed text here.".to_vec())
        .await
        .unwrap();

    assert!(!orchestrator.delete("no-such-id").await.unwrap());
    assert_eq!(orchestrator.status().await.documents_count, 1);
}

#[tokio::test]
async fn clear_all_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_in(dir.path());
    orchestrator
        .ingest("a.txt", b"First document body.".to_vec())
        .await
        .unwrap();
    orchestrator
        .ingest("b.txt", b"Second document body.".to_vec())
        .await
        .unwrap();

    orchestrator.clear_all().await.unwrap();
    orchestrator.clear_all().await.unwrap();

    let status = orchestrator.status().await;
    assert_eq!(status.documents_count, 0);
    assert_eq!(status.chunks_count, 0);
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let doc_id;
    {
        let orchestrator = orchestrator_in(dir.path());
        let doc = orchestrator
            .ingest("durable.txt", b"Lighthouses once burned whale oil.".to_vec())
            .await
            .unwrap();
        doc_id = doc.id;
    }

    let reopened = orchestrator_in(dir.path());
    let doc = reopened.get(&doc_id).await.unwrap();
    assert_eq!(doc.metadata.processing_status, ProcessingStatus::Completed);

    let result = reopened
        .search("Lighthouses once burned whale oil", None, None)
        .await
        .unwrap();
    assert_eq!(result.chunks[0].document_id, doc_id);
    assert!(result.scores[0] >= 0.7);
}

#[tokio::test]
async fn startup_demotes_completed_documents_with_no_vectors() {
    let dir = tempfile::tempdir().unwrap();

    // A registry that claims a completed, chunked document while the vector
    // store has nothing for it. This is what an interrupted delete leaves.
    let doc_id;
    {
        let mut registry = DocumentRegistry::open(dir.path()).unwrap();
        let doc = Document::new("ghost.txt", "txt", 30);
        doc_id = doc.id.clone();
        registry.insert(doc).unwrap();
        registry
            .set_status(&doc_id, ProcessingStatus::Processing)
            .unwrap();
        registry
            .record_processed(&doc_id, "ghost content".to_string(), 2, 1)
            .unwrap();
    }

    let orchestrator = orchestrator_in(dir.path());
    let doc = orchestrator.get(&doc_id).await.unwrap();
    assert_eq!(doc.metadata.processing_status, ProcessingStatus::Failed);
}
