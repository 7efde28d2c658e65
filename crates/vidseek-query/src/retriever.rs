use std::sync::Arc;

use tracing::{debug, warn};

use vidseek_core::traits::VectorStore;
use vidseek_core::types::{
    canonical_video_id, Candidate, DocumentFilter, DocumentType, ScoredDocument, SOURCE_DESCRIPTION, SOURCE_TRANSCRIPT,
};

/// Similarity search against one index partition at a time.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
}

/// `1 - distance`, clamped to `[0, 1]`.
pub fn similarity(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}

pub fn candidate_from(doc: ScoredDocument, document_type: DocumentType) -> Candidate {
    let id = canonical_video_id(&doc.id).to_string();
    let video_path = doc.metadata.get("video_path").cloned().unwrap_or_else(|| id.clone());
    let score = similarity(doc.distance);
    let mut c = Candidate { id, video_path, metadata: doc.metadata, ..Candidate::default() };
    match document_type {
        DocumentType::Description => {
            c.description_score = Some(score);
            c.description = Some(doc.document);
            c.source = SOURCE_DESCRIPTION.to_string();
        }
        DocumentType::Transcript => {
            c.transcript_score = Some(score);
            c.transcript = Some(doc.document);
            c.source = SOURCE_TRANSCRIPT.to_string();
        }
    }
    c
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn try_search(&self, query: &str, document_type: DocumentType, n: usize) -> anyhow::Result<Vec<Candidate>> {
        let docs = self.store.query(query, n, document_type).await?;
        Ok(docs.into_iter().map(|d| candidate_from(d, document_type)).collect())
    }

    /// Like `try_search`, but a store failure yields no candidates.
    pub async fn search(&self, query: &str, document_type: DocumentType, n: usize) -> Vec<Candidate> {
        match self.try_search(query, document_type, n).await {
            Ok(found) => {
                debug!(%document_type, requested = n, found = found.len(), "retrieval");
                found
            }
            Err(e) => {
                warn!(%document_type, error = %e, "retrieval failed, continuing without this signal");
                Vec::new()
            }
        }
    }

    pub async fn transcript_for(&self, video_path: &str) -> Option<String> {
        match self.store.get(&DocumentFilter::transcript_of(video_path)).await {
            Ok(docs) => docs.into_iter().map(|d| d.document).find(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(video_path, error = %e, "transcript lookup failed");
                None
            }
        }
    }
}
