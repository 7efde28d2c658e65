//! Extraction of structured values from free-form model output.
//!
//! Each extractor tries a strict decode first and then one documented
//! fallback; `ParseResult::stage` records which one produced the value.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").ok());

static INDEX_DELIMITERS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[,，、;；\s]+").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Strict,
    Fallback,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult<T> {
    pub value: Option<T>,
    pub raw: String,
    pub stage: ParseStage,
}

impl<T> ParseResult<T> {
    fn strict(value: T, raw: &str) -> Self {
        Self { value: Some(value), raw: raw.to_string(), stage: ParseStage::Strict }
    }

    fn fallback(value: T, raw: &str) -> Self {
        Self { value: Some(value), raw: raw.to_string(), stage: ParseStage::Fallback }
    }

    fn failed(raw: &str) -> Self {
        Self { value: None, raw: raw.to_string(), stage: ParseStage::Failed }
    }

    pub fn ok(&self) -> bool {
        self.value.is_some()
    }
}

fn as_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Stage 1: a fenced code block holding a JSON object.
/// Stage 2: the span from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> ParseResult<Map<String, Value>> {
    if let Some(re) = FENCED_BLOCK.as_ref() {
        let fenced = re
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .find_map(|m| as_object(m.as_str()));
        if let Some(map) = fenced {
            return ParseResult::strict(map, text);
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(map) = as_object(&text[start..=end]) {
                return ParseResult::fallback(map, text);
            }
        }
    }
    ParseResult::failed(text)
}

/// Stage 1: the whole reply is comma-separated integers.
/// Stage 2: split on commas, semicolons and whitespace and keep every token
/// that is an integer once brackets and punctuation are trimmed.
pub fn parse_index_list(text: &str) -> ParseResult<Vec<usize>> {
    let trimmed = text.trim();
    let strict: Option<Vec<usize>> = trimmed.split(',').map(|t| t.trim().parse::<usize>().ok()).collect();
    if let Some(list) = strict.filter(|l| !l.is_empty()) {
        return ParseResult::strict(list, text);
    }

    let tokens: Vec<&str> = match INDEX_DELIMITERS.as_ref() {
        Some(re) => re.split(trimmed).collect(),
        None => trimmed.split(|c: char| c == ',' || c.is_whitespace()).collect(),
    };
    let found: Vec<usize> = tokens
        .into_iter()
        .filter_map(|t| {
            t.trim_matches(|c: char| !c.is_ascii_digit())
                .parse::<usize>()
                .ok()
                .filter(|_| is_index_token(t))
        })
        .collect();
    if found.is_empty() {
        ParseResult::failed(text)
    } else {
        ParseResult::fallback(found, text)
    }
}

/// Digits wrapped only in brackets, quotes or trailing punctuation; a
/// token like `v2beta` is not an index.
fn is_index_token(token: &str) -> bool {
    token
        .trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '"' | '\'' | '.' | ':' | '#' | '`'))
        .chars()
        .all(|c| c.is_ascii_digit())
}
