//! Top-level search: parse, retrieve, combine, filter, rerank, truncate, enrich.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use vidseek_core::config::{SearchSettings, Settings};
use vidseek_core::traits::{VectorStore, VideoCatalog};
use vidseek_core::types::{Candidate, DocumentType, SearchIntent};
use vidseek_llm::{CompletionChain, PromptTemplates, RetryPolicy};

use crate::combiner::{Combiner, ScoreWeights};
use crate::filter::{self, FilterVocabulary};
use crate::parser::QueryParser;
use crate::reranker::Reranker;
use crate::retriever::Retriever;

pub const STAR_RATING_KEY: &str = "star_rating";

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub prefer_remote_parsing: bool,
    pub prefer_remote_reranking: bool,
    /// Bounds every model call made for this request.
    pub deadline: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { prefer_remote_parsing: true, prefer_remote_reranking: true, deadline: None }
    }
}

pub struct VideoSearchEngine {
    parser: QueryParser,
    retriever: Arc<Retriever>,
    combiner: Combiner,
    reranker: Reranker,
    catalog: Option<Arc<dyn VideoCatalog>>,
    settings: SearchSettings,
}

impl VideoSearchEngine {
    pub fn new(
        parser: QueryParser,
        retriever: Arc<Retriever>,
        combiner: Combiner,
        reranker: Reranker,
        catalog: Option<Arc<dyn VideoCatalog>>,
        settings: SearchSettings,
    ) -> Self {
        Self { parser, retriever, combiner, reranker, catalog, settings }
    }

    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn VectorStore>,
        catalog: Option<Arc<dyn VideoCatalog>>,
        chain: CompletionChain,
    ) -> Self {
        let templates = PromptTemplates::load(settings.prompts.dir_path().as_deref());
        let retriever = Arc::new(Retriever::new(store));
        let parser = QueryParser::new(
            chain.clone(),
            templates.clone(),
            FilterVocabulary::from(&settings.filters),
            RetryPolicy::from(&settings.router.parse),
        );
        let reranker = Reranker::new(chain, templates, Some(retriever.clone()), RetryPolicy::from(&settings.router.rerank))
            .with_max_candidates(settings.search.rerank_max_candidates);
        let combiner = Combiner::new(ScoreWeights::from(&settings.search));
        Self::new(parser, retriever, combiner, reranker, catalog, settings.search.clone())
    }

    pub async fn search(&self, query: &str, prefer_remote_parsing: bool, prefer_remote_reranking: bool) -> Vec<Candidate> {
        let opts = SearchOptions { prefer_remote_parsing, prefer_remote_reranking, deadline: self.settings.deadline() };
        self.search_with(query, opts).await
    }

    pub async fn search_with(&self, query: &str, opts: SearchOptions) -> Vec<Candidate> {
        let started = Instant::now();
        let deadline = opts.deadline.map(|d| started + d);
        let intent = self.parser.parse_until(query, opts.prefer_remote_parsing, deadline).await;
        let results = self.run(&intent, opts.prefer_remote_reranking, deadline).await;
        info!(
            query,
            mode = %intent.search_mode,
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search finished"
        );
        results
    }

    /// Runs the pipeline for an already-parsed intent.
    pub async fn execute(&self, intent: &SearchIntent, opts: SearchOptions) -> Vec<Candidate> {
        let deadline = opts.deadline.map(|d| Instant::now() + d);
        self.run(intent, opts.prefer_remote_reranking, deadline).await
    }

    async fn run(&self, intent: &SearchIntent, prefer_remote_reranking: bool, deadline: Option<Instant>) -> Vec<Candidate> {
        let limit = intent.limit.max(1);

        let description = match intent.description_query.as_deref() {
            Some(q) if intent.searches_description() => {
                self.retriever.search(q, DocumentType::Description, self.settings.description_candidates(limit)).await
            }
            _ => Vec::new(),
        };
        let transcript = match intent.transcript_query.as_deref() {
            Some(q) if intent.searches_transcript() => {
                self.retriever.search(q, DocumentType::Transcript, self.settings.transcript_candidates.max(limit)).await
            }
            _ => Vec::new(),
        };
        debug!(description = description.len(), transcript = transcript.len(), "retrieved");

        let mut candidates = self.combiner.combine(description, transcript, intent.search_mode);

        if self.settings.apply_metadata_filters && !intent.metadata_filters.is_empty() {
            let before = candidates.len();
            candidates.retain(|c| filter::matches(&c.metadata, &intent.metadata_filters));
            debug!(before, after = candidates.len(), filters = ?intent.metadata_filters, "metadata filter applied");
        }

        if candidates.len() > limit {
            candidates = self.reranker.rerank_until(candidates, intent, prefer_remote_reranking, deadline).await;
        }
        candidates.truncate(limit);

        self.enrich(&mut candidates).await;
        candidates
    }

    async fn enrich(&self, candidates: &mut [Candidate]) {
        if self.settings.attach_transcripts {
            for c in candidates.iter_mut().filter(|c| c.transcript.is_none()) {
                c.transcript = self.retriever.transcript_for(&c.video_path).await;
            }
        }
        let Some(catalog) = self.catalog.clone() else { return };

        // Catalog lookups are blocking SQLite reads.
        let paths: Vec<String> = candidates.iter().map(|c| c.video_path.clone()).collect();
        let count = paths.len();
        let ratings = tokio::task::spawn_blocking(move || {
            paths
                .iter()
                .map(|p| match catalog.star_rating(p) {
                    Ok(r) => r.unwrap_or(0),
                    Err(e) => {
                        warn!(video_path = %p, error = %e, "star rating lookup failed");
                        0
                    }
                })
                .collect::<Vec<u8>>()
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "star rating task failed");
            vec![0; count]
        });
        for (c, rating) in candidates.iter_mut().zip(ratings) {
            c.metadata.insert(STAR_RATING_KEY.to_string(), rating.to_string());
        }
    }
}
