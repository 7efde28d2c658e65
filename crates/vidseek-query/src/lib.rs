//! Query-time retrieval and ranking over the description and transcript
//! indexes.

pub mod combiner;
pub mod engine;
pub mod filter;
pub mod parser;
pub mod reranker;
pub mod response;
pub mod retriever;

pub use combiner::{Combiner, ScoreWeights};
pub use engine::{SearchOptions, VideoSearchEngine};
pub use filter::FilterVocabulary;
pub use parser::QueryParser;
pub use reranker::Reranker;
pub use retriever::Retriever;
