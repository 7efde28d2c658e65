use async_trait::async_trait;

use crate::types::{DocumentFilter, DocumentType, ScoredDocument, StoredDocument};

/// Dense text embedder. Output vectors are L2-normalized and `dim()` long.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Similarity index over description and transcript documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, docs: &[StoredDocument]) -> anyhow::Result<usize>;

    /// Top `n` documents of one type, most similar first.
    async fn query(&self, text: &str, n: usize, document_type: DocumentType) -> anyhow::Result<Vec<ScoredDocument>>;

    /// Documents matching `filter`. Order is store-defined.
    async fn get(&self, filter: &DocumentFilter) -> anyhow::Result<Vec<ScoredDocument>>;
}

/// Per-video bookkeeping kept outside the vector index.
pub trait VideoCatalog: Send + Sync {
    fn star_rating(&self, video_path: &str) -> anyhow::Result<Option<u8>>;
    fn set_star_rating(&self, video_path: &str, rating: u8) -> anyhow::Result<()>;
    fn is_processed(&self, video_path: &str) -> anyhow::Result<bool>;
    fn mark_processed(&self, video_path: &str) -> anyhow::Result<()>;
}

/// A remote language-model provider. One call, one prompt, one reply.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// A model served on this machine; used when remote providers are bypassed.
#[async_trait]
pub trait LocalModel: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> anyhow::Result<String>;
}
