use std::fs;
use tempfile::TempDir;

use vidseek_core::config::{expand_path, Config, ProviderKind, Settings};
use vidseek_core::types::{
    canonical_video_id, video_id_for_path, Candidate, DocumentType, SearchIntent, SearchMode, DEFAULT_LIMIT, MAX_LIMIT,
};

#[test]
fn limit_normalization_defaults_and_caps() {
    assert_eq!(SearchIntent::normalize_limit(0), DEFAULT_LIMIT);
    assert_eq!(SearchIntent::normalize_limit(-5), DEFAULT_LIMIT);
    assert_eq!(SearchIntent::normalize_limit(1), 1);
    assert_eq!(SearchIntent::normalize_limit(37), 37);
    assert_eq!(SearchIntent::normalize_limit(100), 100);
    assert_eq!(SearchIntent::normalize_limit(5000), MAX_LIMIT);
}

#[test]
fn search_mode_coerces_unknown_to_auto() {
    assert_eq!(SearchMode::coerce("and"), SearchMode::And);
    assert_eq!(SearchMode::coerce(" Transcript_Only "), SearchMode::TranscriptOnly);
    assert_eq!(SearchMode::coerce("both please"), SearchMode::Auto);
    assert_eq!(SearchMode::coerce(""), SearchMode::Auto);
    assert_eq!(SearchMode::default(), SearchMode::Auto);
}

#[test]
fn fallback_intent_searches_descriptions_only() {
    let intent = SearchIntent::fallback("cat on a sofa");
    assert_eq!(intent.description_query.as_deref(), Some("cat on a sofa"));
    assert!(intent.transcript_query.is_none());
    assert_eq!(intent.search_mode, SearchMode::DescriptionOnly);
    assert_eq!(intent.limit, DEFAULT_LIMIT);
    assert!(intent.searches_description());
    assert!(!intent.searches_transcript());
}

#[test]
fn transcript_ids_map_back_to_the_video() {
    let vid = video_id_for_path("/videos/a.mp4");
    assert_eq!(vid.len(), 64, "blake3 hex digest");
    assert_eq!(vid, video_id_for_path("/videos/a.mp4"));
    let tid = DocumentType::Transcript.document_id(&vid);
    assert_eq!(canonical_video_id(&tid), vid);
    assert_eq!(canonical_video_id(&vid), vid);
    assert_eq!(DocumentType::Description.document_id(&vid), vid);
}

#[test]
fn rank_score_prefers_combined_then_single() {
    let mut c = Candidate { description_score: Some(0.3), ..Candidate::default() };
    assert!((c.rank_score() - 0.3).abs() < 1e-6);
    c.combined_score = Some(0.9);
    assert!((c.rank_score() - 0.9).abs() < 1e-6);
    let t = Candidate { transcript_score: Some(0.5), ..Candidate::default() };
    assert!((t.rank_score() - 0.5).abs() < 1e-6);
}

#[test]
fn default_settings_are_valid() {
    let settings = Settings::default();
    settings.validate().expect("defaults validate");
    assert_eq!(settings.router.cooldown_secs, 300);
    assert_eq!(settings.router.parse.max_retries, 3);
    assert!((settings.router.rerank.timeout_secs - 100.0).abs() < f64::EPSILON);
    assert!((settings.search.description_weight - 0.6).abs() < 1e-6);
    assert!((settings.search.transcript_weight - 0.4).abs() < 1e-6);
    assert_eq!(settings.search.description_candidates(20), 200);
    assert_eq!(settings.search.description_candidates(2), 50);
}

#[test]
fn settings_from_toml_file() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("config.toml");
    fs::write(
        &path,
        r#"
[router]
cooldown_secs = 60

[router.parse]
max_retries = 2
retry_delay_secs = 0.5
timeout_secs = 10

[provider_priorities]
deepseek = 1
azure = 5

[providers.deepseek]
kind = "openai"
base_url = "https://api.deepseek.com/v1"
model = "deepseek-chat"
api_key = "sk-test"

[providers.azure]
kind = "azure"
base_url = "https://example.openai.azure.com"
model = "gpt-4o"
api_key_env = "VIDSEEK_TEST_UNSET_KEY"
api_version = "2024-06-01"

[search]
rerank_max_candidates = 30
"#,
    )
    .expect("write config");

    let settings = Config::from_file(&path).settings().expect("settings");
    assert_eq!(settings.router.cooldown_secs, 60);
    assert_eq!(settings.router.parse.max_retries, 2);
    assert_eq!(settings.router.rerank.max_retries, 3, "untouched section keeps defaults");
    assert_eq!(settings.provider_priorities.get("deepseek"), Some(&1));
    assert_eq!(settings.providers["azure"].kind, ProviderKind::Azure);
    assert_eq!(settings.providers["deepseek"].resolve_api_key().as_deref(), Some("sk-test"));
    assert!(settings.providers["azure"].resolve_api_key().is_none());
    assert_eq!(settings.search.rerank_max_candidates, 30);
    assert!((settings.search.description_weight - 0.6).abs() < 1e-6);
}

#[test]
fn invalid_settings_are_rejected() {
    let zero_retries = Config::from_toml_str("[router.rerank]\nmax_retries = 0\n");
    assert!(zero_retries.settings().is_err());

    let zero_weights = Config::from_toml_str("[search]\ndescription_weight = 0.0\ntranscript_weight = 0.0\n");
    assert!(zero_weights.settings().is_err());

    let bad_default = Config::from_toml_str("[filters]\ntime_of_day_default = \"dusk\"\n");
    assert!(bad_default.settings().is_err());

    let ok = Config::from_toml_str("[filters]\ntime_of_day = [\"day\", \"dusk\"]\ntime_of_day_default = \"dusk\"\n");
    assert!(ok.settings().is_ok());
}

#[test]
fn get_reads_a_single_key() {
    let config = Config::from_toml_str("[store]\ntable = \"clips\"\n");
    let table: String = config.get("store.table").expect("table");
    assert_eq!(table, "clips");
    assert!(config.get::<String>("store.missing").is_err());
}

#[test]
fn expand_path_resolves_home() {
    assert!(!expand_path("~/x").to_string_lossy().starts_with('~'));
}
