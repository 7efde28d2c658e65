//! Model-based reordering of an oversized candidate list.
//!
//! The model sees numbered candidates and answers with a list of numbers.
//! Named candidates come first in the model's order; every other candidate
//! follows in its original order, so nothing is ever dropped.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use vidseek_core::types::{Candidate, SearchIntent, SearchMode};
use vidseek_llm::{CompletionChain, InvokeOptions, PromptTemplates, RetryPolicy, TemplateName};

use crate::response::parse_index_list;
use crate::retriever::Retriever;

pub const DEFAULT_MAX_CANDIDATES: usize = 50;
const SNIPPET_CHARS: usize = 400;

pub struct Reranker {
    chain: CompletionChain,
    templates: PromptTemplates,
    retriever: Option<Arc<Retriever>>,
    policy: RetryPolicy,
    max_candidates: usize,
}

/// The question put to the model, built from the intent's active query fields.
pub fn build_rerank_query(intent: &SearchIntent) -> String {
    let d = intent.description_query.as_deref();
    let t = intent.transcript_query.as_deref();
    match (intent.search_mode, d, t) {
        (SearchMode::DescriptionOnly, Some(d), _) => format!("Video content: {d}"),
        (SearchMode::TranscriptOnly, _, Some(t)) => format!("Spoken content: {t}"),
        (SearchMode::And, Some(d), Some(t)) => format!("Video content: {d} and spoken content: {t}"),
        (SearchMode::Or, Some(d), Some(t)) => format!("Video content: {d} or spoken content: {t}"),
        (_, Some(d), Some(t)) => format!("Video content: {d} Spoken content: {t}"),
        (_, Some(d), None) => format!("Video content: {d}"),
        (_, None, Some(t)) => format!("Spoken content: {t}"),
        (_, None, None) => "Rank the videos by relevance of their content".to_string(),
    }
}

pub fn select_template(intent: &SearchIntent) -> TemplateName {
    let transcript_led = intent.transcript_query.is_some() && intent.description_query.is_none();
    if intent.search_mode == SearchMode::TranscriptOnly || transcript_led {
        TemplateName::TranscriptReranking
    } else {
        TemplateName::Reranking
    }
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

pub fn describe_candidate(index: usize, c: &Candidate) -> String {
    let mut s = format!("Video {index}:\n");
    if let Some(d) = c.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(s, "Description: {}", snippet(d));
    }
    if let Some(t) = c.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
        let _ = writeln!(s, "Transcript: {}", snippet(t));
    }
    if let Some(scene) = c.metadata.get("scene").filter(|v| !v.trim().is_empty()) {
        let _ = writeln!(s, "Scene: {scene}");
    }
    s
}

/// Named indices first (duplicates and out-of-range numbers ignored), then
/// everything else in original order. `None` when no index is usable.
pub fn apply_order(candidates: Vec<Candidate>, order: &[usize], described: usize) -> Option<Vec<Candidate>> {
    let mut seen = HashSet::new();
    let picked: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| i < described.min(candidates.len()) && seen.insert(i))
        .collect();
    if picked.is_empty() {
        return None;
    }
    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(slots.len());
    for i in picked {
        if let Some(c) = slots[i].take() {
            out.push(c);
        }
    }
    out.extend(slots.into_iter().flatten());
    Some(out)
}

/// Single-source modes carry only that source's score.
pub fn score_hygiene(c: &mut Candidate, mode: SearchMode) {
    match mode {
        SearchMode::TranscriptOnly => c.description_score = None,
        SearchMode::DescriptionOnly => c.transcript_score = None,
        _ => {}
    }
}

impl Reranker {
    pub fn new(chain: CompletionChain, templates: PromptTemplates, retriever: Option<Arc<Retriever>>, policy: RetryPolicy) -> Self {
        Self { chain, templates, retriever, policy, max_candidates: DEFAULT_MAX_CANDIDATES }
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max.max(1);
        self
    }

    pub async fn rerank(&self, candidates: Vec<Candidate>, intent: &SearchIntent, prefer_remote: bool) -> Vec<Candidate> {
        self.rerank_until(candidates, intent, prefer_remote, None).await
    }

    /// Never fails: any model or parse problem returns the input order.
    pub async fn rerank_until(
        &self,
        mut candidates: Vec<Candidate>,
        intent: &SearchIntent,
        prefer_remote: bool,
        deadline: Option<Instant>,
    ) -> Vec<Candidate> {
        if candidates.len() < 2 {
            return candidates;
        }
        let described = candidates.len().min(self.max_candidates);
        let wants_transcript = intent.search_mode == SearchMode::TranscriptOnly || intent.transcript_query.is_some();

        let mut blocks = Vec::with_capacity(described);
        for (i, c) in candidates.iter_mut().take(described).enumerate() {
            if wants_transcript && c.transcript.is_none() {
                if let Some(r) = &self.retriever {
                    c.transcript = r.transcript_for(&c.video_path).await;
                }
            }
            blocks.push(describe_candidate(i, c));
        }

        let template = select_template(intent);
        let query = build_rerank_query(intent);
        let descriptions = blocks.join("\n");
        let prompt = self
            .templates
            .render(template, &[("query", query.as_str()), ("video_descriptions", descriptions.as_str())]);

        let opts = InvokeOptions::new(self.policy).with_deadline(deadline);
        let completion = match self.chain.complete(&prompt, prefer_remote, &opts).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "rerank unavailable, keeping retrieval order");
                return candidates;
            }
        };

        let parsed = parse_index_list(&completion.text);
        let Some(order) = parsed.value else {
            warn!(response = %parsed.raw, "rerank reply had no candidate numbers, keeping retrieval order");
            return candidates;
        };
        debug!(stage = ?parsed.stage, named = order.len(), "rerank reply parsed");

        let total = candidates.len();
        match apply_order(candidates.clone(), &order, described) {
            Some(mut reordered) => {
                for c in &mut reordered {
                    score_hygiene(c, intent.search_mode);
                }
                info!(origin = ?completion.origin, %template, described, total, "candidates reranked");
                reordered
            }
            None => {
                warn!(response = %parsed.raw, "rerank reply named no valid candidate, keeping retrieval order");
                candidates
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(path: &str) -> Candidate {
        Candidate { id: path.into(), video_path: path.into(), ..Candidate::default() }
    }

    #[test]
    fn unnamed_candidates_follow_in_original_order() {
        let list = vec![cand("a"), cand("b"), cand("c"), cand("d")];
        let out = apply_order(list, &[2, 0, 2, 9], 4).expect("reordered");
        let paths: Vec<&str> = out.iter().map(|c| c.video_path.as_str()).collect();
        assert_eq!(paths, ["c", "a", "b", "d"]);
    }

    #[test]
    fn indices_past_the_described_prefix_are_ignored() {
        let list = vec![cand("a"), cand("b"), cand("c")];
        let out = apply_order(list, &[2, 1], 2).expect("reordered");
        let paths: Vec<&str> = out.iter().map(|c| c.video_path.as_str()).collect();
        assert_eq!(paths, ["b", "a", "c"]);
        assert!(apply_order(vec![cand("a")], &[5], 1).is_none());
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let long: String = "é".repeat(SNIPPET_CHARS + 10);
        assert_eq!(snippet(&long).chars().count(), SNIPPET_CHARS);
        assert_eq!(snippet("short"), "short");
    }
}
