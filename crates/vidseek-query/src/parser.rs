use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vidseek_core::types::{Filters, SearchIntent, SearchMode, DEFAULT_LIMIT};
use vidseek_llm::{CompletionChain, InvokeOptions, PromptTemplates, RetryPolicy, TemplateName};

use crate::filter::{is_unspecified, FilterVocabulary};
use crate::response::{extract_json_object, ParseStage};

/// Shape the query-parser prompt asks the model to produce.
pub const FORMAT_INSTRUCTIONS: &str = r#"Reply with a single JSON object inside a ```json code block and nothing else. Fields:
- "description_query": string, or "unspecified"
- "transcript_query": string, or "unspecified"
- "metadata_filters": object mapping field name to string value, e.g. {"time_of_day": "night", "color": "red", "orientation": "portrait"}
- "limit": integer number of results wanted, 0 if not stated
- "search_mode": one of "description_only", "transcript_only", "or", "and", "auto"

Example:
```json
{"description_query": "dog running on a beach", "transcript_query": "unspecified", "metadata_filters": {}, "limit": 0, "search_mode": "auto"}
```"#;

/// Turns a free-text query into a `SearchIntent`. Never fails: any model or
/// extraction problem yields the description-only fallback intent.
pub struct QueryParser {
    chain: CompletionChain,
    templates: PromptTemplates,
    vocabulary: FilterVocabulary,
    policy: RetryPolicy,
}

impl QueryParser {
    pub fn new(chain: CompletionChain, templates: PromptTemplates, vocabulary: FilterVocabulary, policy: RetryPolicy) -> Self {
        Self { chain, templates, vocabulary, policy }
    }

    pub fn prompt(&self, raw_query: &str) -> String {
        self.templates
            .render(TemplateName::QueryParser, &[("query", raw_query), ("format_instructions", FORMAT_INSTRUCTIONS)])
    }

    pub async fn parse(&self, raw_query: &str, prefer_remote: bool) -> SearchIntent {
        self.parse_until(raw_query, prefer_remote, None).await
    }

    pub async fn parse_until(&self, raw_query: &str, prefer_remote: bool, deadline: Option<Instant>) -> SearchIntent {
        let opts = InvokeOptions::new(self.policy).with_deadline(deadline);
        match self.chain.complete(&self.prompt(raw_query), prefer_remote, &opts).await {
            Ok(completion) => {
                debug!(origin = ?completion.origin, "query parser completion");
                self.parse_response(raw_query, &completion.text)
            }
            Err(e) => {
                warn!(error = %e, "query parsing unavailable, searching descriptions with the raw query");
                SearchIntent::fallback(raw_query)
            }
        }
    }

    /// Intent from a model reply; the fallback intent when no object is found.
    pub fn parse_response(&self, raw_query: &str, text: &str) -> SearchIntent {
        let extracted = extract_json_object(text);
        match (extracted.stage, extracted.value) {
            (ParseStage::Failed, _) | (_, None) => {
                warn!(response = %extracted.raw, "no JSON object in parser reply, using fallback intent");
                SearchIntent::fallback(raw_query)
            }
            (stage, Some(map)) => {
                let intent = intent_from_object(raw_query, &map, &self.vocabulary);
                info!(
                    ?stage,
                    mode = %intent.search_mode,
                    limit = intent.limit,
                    description = intent.description_query.as_deref().unwrap_or(""),
                    transcript = intent.transcript_query.as_deref().unwrap_or(""),
                    "query parsed"
                );
                intent
            }
        }
    }
}

fn query_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !is_unspecified(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

fn limit_field(map: &Map<String, Value>) -> usize {
    let raw = match map.get("limit") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    raw.map_or(DEFAULT_LIMIT, SearchIntent::normalize_limit)
}

fn filters_field(map: &Map<String, Value>) -> Filters {
    let Some(Value::Object(obj)) = map.get("metadata_filters") else {
        return Filters::new();
    };
    obj.iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.trim().to_string())),
            Value::Number(n) => Some((k.clone(), n.to_string())),
            Value::Bool(b) => Some((k.clone(), b.to_string())),
            _ => None,
        })
        .collect()
}

/// Picks a concrete mode for `auto` from the present query fields. Explicit
/// modes pass through; with no query at all the raw text is a description.
fn resolve_mode(mode: SearchMode, has_description: bool, has_transcript: bool) -> SearchMode {
    match (mode, has_description, has_transcript) {
        (_, false, false) => SearchMode::DescriptionOnly,
        (SearchMode::Auto, true, true) => SearchMode::And,
        (SearchMode::Auto, true, false) => SearchMode::DescriptionOnly,
        (SearchMode::Auto, false, true) => SearchMode::TranscriptOnly,
        (explicit, _, _) => explicit,
    }
}

pub fn intent_from_object(raw_query: &str, map: &Map<String, Value>, vocabulary: &FilterVocabulary) -> SearchIntent {
    let mut description_query = query_field(map, "description_query");
    let transcript_query = query_field(map, "transcript_query");
    let requested = map.get("search_mode").and_then(Value::as_str).map_or(SearchMode::Auto, SearchMode::coerce);
    let search_mode = resolve_mode(requested, description_query.is_some(), transcript_query.is_some());
    if description_query.is_none() && transcript_query.is_none() {
        description_query = Some(raw_query.to_string());
    }
    SearchIntent {
        description_query,
        transcript_query,
        metadata_filters: vocabulary.validate(filters_field(map)),
        limit: limit_field(map),
        search_mode,
    }
}
