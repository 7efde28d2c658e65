mod common;

use std::sync::Arc;

use tempfile::TempDir;

use vidseek_core::config::Settings;
use vidseek_core::traits::{VectorStore, VideoCatalog};
use vidseek_core::types::{DocumentType, Filters, Meta, SearchIntent, SearchMode, StoredDocument};
use vidseek_embed::FakeEmbedder;
use vidseek_query::{SearchOptions, VideoSearchEngine};
use vidseek_store::{LanceVectorStore, SqliteCatalog};

use common::chain_of;

fn doc(path: &str, kind: DocumentType, text: &str, time_of_day: &str) -> StoredDocument {
    let mut meta = Meta::new();
    meta.insert("time_of_day".into(), time_of_day.into());
    StoredDocument::new(path, kind, text, meta)
}

#[tokio::test]
async fn engine_over_lance_and_sqlite() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceVectorStore::open(&tmp.path().join("lancedb"), "video_documents", Arc::new(FakeEmbedder::new(64)))
        .await
        .expect("open store");
    store
        .add(&[
            doc("/v/beach.mp4", DocumentType::Description, "sunset beach walk with waves", "day"),
            doc("/v/beach.mp4", DocumentType::Transcript, "listen to the waves tonight", "day"),
            doc("/v/city.mp4", DocumentType::Description, "busy city street traffic", "night"),
            doc("/v/forest.mp4", DocumentType::Description, "quiet forest trail in the rain", "day"),
        ])
        .await
        .expect("add");

    let catalog = SqliteCatalog::open(&tmp.path().join("catalog.db")).expect("catalog");
    catalog.set_star_rating("/v/beach.mp4", 5).expect("rate");

    let store: Arc<dyn VectorStore> = Arc::new(store);
    let catalog: Arc<dyn VideoCatalog> = Arc::new(catalog);
    let engine = VideoSearchEngine::from_settings(&Settings::default(), store, Some(catalog), chain_of(vec![], None));

    let intent = SearchIntent {
        description_query: Some("sunset beach walk".into()),
        transcript_query: None,
        metadata_filters: Filters::new(),
        limit: 2,
        search_mode: SearchMode::DescriptionOnly,
    };
    let results = engine.execute(&intent, SearchOptions::default()).await;

    assert_eq!(results.len(), 2);
    let top = &results[0];
    assert_eq!(top.video_path, "/v/beach.mp4");
    assert_eq!(top.transcript.as_deref(), Some("listen to the waves tonight"));
    assert_eq!(top.metadata.get("star_rating").map(String::as_str), Some("5"));
    assert_eq!(results[1].metadata.get("star_rating").map(String::as_str), Some("0"));
    assert!(top.description_score.expect("score") > results[1].description_score.expect("score"));

    let mut night = intent.clone();
    night.limit = 5;
    night.metadata_filters.insert("time_of_day".into(), "night".into());
    let filtered = engine.execute(&night, SearchOptions::default()).await;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].video_path, "/v/city.mp4");
}
