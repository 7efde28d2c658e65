use vidseek_core::traits::Embedder;
use vidseek_embed::{get_default_embedder, FakeEmbedder, EMBEDDING_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(None).expect("embedder");
    let texts = vec!["sunset beach walk".to_string(), "sunset beach walk".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs[0].len(), EMBEDDING_DIM);
    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn shared_words_score_higher_than_unrelated_text() {
    let embedder = FakeEmbedder::new(256);
    let texts = vec![
        "a dog running on the beach".to_string(),
        "dog on the beach at sunset".to_string(),
        "quarterly revenue spreadsheet".to_string(),
    ];
    let e = embedder.embed_batch(&texts).expect("embed");
    assert!(cosine(&e[0], &e[1]) > cosine(&e[0], &e[2]));
}

#[test]
fn empty_text_still_yields_unit_vector() {
    let embedder = FakeEmbedder::new(8);
    let e = embedder.embed_batch(&[String::new()]).expect("embed");
    let norm: f32 = e[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
}
