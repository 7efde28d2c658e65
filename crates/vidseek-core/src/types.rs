//! Domain types shared by the store, language-model and query crates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

pub type Meta = HashMap<String, String>;
pub type Filters = BTreeMap<String, String>;

/// Suffix that turns a video id into the id of its transcript document.
pub const TRANSCRIPT_SUFFIX: &str = "_transcript";

pub const SOURCE_DESCRIPTION: &str = "description";
pub const SOURCE_TRANSCRIPT: &str = "transcript";

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Partition tag of a stored text: which index it belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Description,
    Transcript,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Description => "description",
            DocumentType::Transcript => "transcript",
        }
    }

    /// Id under which a video's document of this type is stored.
    pub fn document_id(&self, video_id: &str) -> String {
        match self {
            DocumentType::Description => video_id.to_string(),
            DocumentType::Transcript => format!("{video_id}{TRANSCRIPT_SUFFIX}"),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(DocumentType::Description),
            "transcript" => Ok(DocumentType::Transcript),
            other => Err(crate::error::Error::InvalidValue(format!("document type '{other}'"))),
        }
    }
}

/// Recover the owning video's id from a stored document id.
pub fn canonical_video_id(document_id: &str) -> &str {
    document_id.strip_suffix(TRANSCRIPT_SUFFIX).unwrap_or(document_id)
}

/// Stable video id derived from its file path (BLAKE3 hex digest).
pub fn video_id_for_path(video_path: &str) -> String {
    blake3::hash(video_path.as_bytes()).to_hex().to_string()
}

/// A text document as written to the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub video_path: String,
    pub document_type: DocumentType,
    pub text: String,
    pub metadata: Meta,
}

impl StoredDocument {
    pub fn new(video_path: &str, document_type: DocumentType, text: impl Into<String>, metadata: Meta) -> Self {
        let id = document_type.document_id(&video_id_for_path(video_path));
        Self { id, video_path: video_path.to_string(), document_type, text: text.into(), metadata }
    }
}

/// One row of a similarity query. `distance` is the store's raw distance;
/// `metadata` always carries `video_path` and `document_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredDocument {
    pub id: String,
    pub metadata: Meta,
    pub distance: f32,
    pub document: String,
}

/// Restricts `VectorStore::get`. Empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub document_type: Option<DocumentType>,
    pub video_path: Option<String>,
}

impl DocumentFilter {
    pub fn transcript_of(video_path: &str) -> Self {
        Self { document_type: Some(DocumentType::Transcript), video_path: Some(video_path.to_string()) }
    }
}

/// How the two signal sources are combined.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    DescriptionOnly,
    TranscriptOnly,
    Or,
    And,
    #[default]
    Auto,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::DescriptionOnly => "description_only",
            SearchMode::TranscriptOnly => "transcript_only",
            SearchMode::Or => "or",
            SearchMode::And => "and",
            SearchMode::Auto => "auto",
        }
    }

    /// Lenient parse: anything unrecognised becomes `Auto`.
    pub fn coerce(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "description_only" => Ok(SearchMode::DescriptionOnly),
            "transcript_only" => Ok(SearchMode::TranscriptOnly),
            "or" => Ok(SearchMode::Or),
            "and" => Ok(SearchMode::And),
            "auto" => Ok(SearchMode::Auto),
            other => Err(crate::error::Error::InvalidValue(format!("search mode '{other}'"))),
        }
    }
}

/// Structured interpretation of a free-text query.
///
/// Produced by the query parser; read-only afterwards. At least one of the
/// two query fields is set on every intent the parser returns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchIntent {
    pub description_query: Option<String>,
    pub transcript_query: Option<String>,
    pub metadata_filters: Filters,
    pub limit: usize,
    pub search_mode: SearchMode,
}

impl SearchIntent {
    /// Conservative intent: search descriptions with the raw query.
    pub fn fallback(raw_query: &str) -> Self {
        Self {
            description_query: Some(raw_query.to_string()),
            transcript_query: None,
            metadata_filters: Filters::new(),
            limit: DEFAULT_LIMIT,
            search_mode: SearchMode::DescriptionOnly,
        }
    }

    /// Values below 1 mean "unspecified" and take the default; values above
    /// the maximum are capped.
    pub fn normalize_limit(raw: i64) -> usize {
        if raw < 1 {
            DEFAULT_LIMIT
        } else {
            usize::try_from(raw).map_or(MAX_LIMIT, |v| v.min(MAX_LIMIT))
        }
    }

    pub fn searches_description(&self) -> bool {
        self.search_mode != SearchMode::TranscriptOnly && self.description_query.is_some()
    }

    pub fn searches_transcript(&self) -> bool {
        self.search_mode != SearchMode::DescriptionOnly && self.transcript_query.is_some()
    }
}

/// A scored, partially merged search result for one video.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub video_path: String,
    pub description_score: Option<f32>,
    pub transcript_score: Option<f32>,
    pub combined_score: Option<f32>,
    pub description: Option<String>,
    pub transcript: Option<String>,
    pub metadata: Meta,
    pub source: String,
}

impl Candidate {
    /// Combined score when present, else whichever single score exists.
    pub fn rank_score(&self) -> f32 {
        self.combined_score
            .or(self.description_score)
            .or(self.transcript_score)
            .unwrap_or(0.0)
    }
}
