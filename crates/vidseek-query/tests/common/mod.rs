#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vidseek_core::traits::{LocalModel, ProviderClient, VectorStore, VideoCatalog};
use vidseek_core::types::{DocumentFilter, DocumentType, Meta, ScoredDocument, StoredDocument, TRANSCRIPT_SUFFIX};
use vidseek_llm::{CompletionChain, InvokeOptions, LocalParams, ProviderRegistry, RetryPolicy, Router};

/// In-memory store returning preset hits per document type.
#[derive(Default)]
pub struct FakeStore {
    hits: Mutex<HashMap<DocumentType, Vec<ScoredDocument>>>,
    failing: Mutex<Vec<DocumentType>>,
    pub queries: Mutex<Vec<(DocumentType, usize)>>,
}

pub fn hit(path: &str, document_type: DocumentType, distance: f32, text: &str) -> ScoredDocument {
    let id = match document_type {
        DocumentType::Description => path.to_string(),
        DocumentType::Transcript => format!("{path}{TRANSCRIPT_SUFFIX}"),
    };
    let mut metadata = Meta::new();
    metadata.insert("video_path".into(), path.into());
    metadata.insert("document_type".into(), document_type.as_str().into());
    ScoredDocument { id, metadata, distance, document: text.into() }
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(self, document_type: DocumentType, docs: Vec<ScoredDocument>) -> Self {
        self.hits.lock().expect("lock").insert(document_type, docs);
        self
    }

    pub fn failing(self, document_type: DocumentType) -> Self {
        self.failing.lock().expect("lock").push(document_type);
        self
    }

    pub fn query_count(&self, document_type: DocumentType) -> usize {
        self.queries.lock().expect("lock").iter().filter(|(t, _)| *t == document_type).count()
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn add(&self, docs: &[StoredDocument]) -> anyhow::Result<usize> {
        let mut hits = self.hits.lock().expect("lock");
        for d in docs {
            let mut metadata = d.metadata.clone();
            metadata.insert("video_path".into(), d.video_path.clone());
            hits.entry(d.document_type).or_default().push(ScoredDocument {
                id: d.id.clone(),
                metadata,
                distance: 0.0,
                document: d.text.clone(),
            });
        }
        Ok(docs.len())
    }

    async fn query(&self, _text: &str, n: usize, document_type: DocumentType) -> anyhow::Result<Vec<ScoredDocument>> {
        self.queries.lock().expect("lock").push((document_type, n));
        if self.failing.lock().expect("lock").contains(&document_type) {
            anyhow::bail!("index offline");
        }
        let hits = self.hits.lock().expect("lock");
        Ok(hits.get(&document_type).map(|v| v.iter().take(n).cloned().collect()).unwrap_or_default())
    }

    async fn get(&self, filter: &DocumentFilter) -> anyhow::Result<Vec<ScoredDocument>> {
        let hits = self.hits.lock().expect("lock");
        let out = hits
            .iter()
            .filter(|(t, _)| filter.document_type.map_or(true, |want| want == **t))
            .flat_map(|(_, docs)| docs.iter())
            .filter(|d| {
                filter.video_path.as_deref().map_or(true, |p| d.metadata.get("video_path").map(String::as_str) == Some(p))
            })
            .cloned()
            .collect();
        Ok(out)
    }
}

/// Remote provider answering every prompt with a fixed reply or error.
pub struct FakeProvider {
    name: String,
    reply: Option<String>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(name: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply: Some(reply.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().expect("lock").push(prompt.to_string());
        match &self.reply {
            Some(r) => Ok(r.clone()),
            None => Err(anyhow::anyhow!("{} unavailable", self.name)),
        }
    }
}

pub struct FakeLocal {
    pub reply: String,
    pub calls: AtomicUsize,
}

impl FakeLocal {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: reply.into(), calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl LocalModel for FakeLocal {
    async fn generate(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    ratings: Mutex<HashMap<String, u8>>,
}

impl VideoCatalog for FakeCatalog {
    fn star_rating(&self, video_path: &str) -> anyhow::Result<Option<u8>> {
        Ok(self.ratings.lock().expect("lock").get(video_path).copied())
    }

    fn set_star_rating(&self, video_path: &str, rating: u8) -> anyhow::Result<()> {
        self.ratings.lock().expect("lock").insert(video_path.to_string(), rating);
        Ok(())
    }

    fn is_processed(&self, video_path: &str) -> anyhow::Result<bool> {
        Ok(self.ratings.lock().expect("lock").contains_key(video_path))
    }

    fn mark_processed(&self, video_path: &str) -> anyhow::Result<()> {
        self.ratings.lock().expect("lock").entry(video_path.to_string()).or_insert(0);
        Ok(())
    }
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy { max_retries: 1, retry_delay: Duration::ZERO, timeout: Duration::from_secs(2) }
}

pub fn fast_opts() -> InvokeOptions {
    InvokeOptions::new(fast_policy())
}

/// Chain over the given remote providers (priority in argument order) and
/// an optional local model.
pub fn chain_of(providers: Vec<Arc<FakeProvider>>, local: Option<Arc<FakeLocal>>) -> CompletionChain {
    let router = if providers.is_empty() {
        None
    } else {
        let mut registry = ProviderRegistry::new();
        for (i, p) in providers.into_iter().enumerate() {
            registry.register(p, (i + 1) as u32);
        }
        Some(Arc::new(Router::new(Arc::new(registry), Duration::from_secs(300))))
    };
    let local = local.map(|l| l as Arc<dyn LocalModel>);
    CompletionChain::new(router, local, LocalParams::default())
}
