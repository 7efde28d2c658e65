use vidseek_core::types::{Candidate, Filters, Meta, SearchMode};
use vidseek_query::filter::{is_unspecified, matches};
use vidseek_query::{Combiner, ScoreWeights};

fn desc(path: &str, score: f32) -> Candidate {
    Candidate {
        id: path.into(),
        video_path: path.into(),
        description_score: Some(score),
        description: Some(format!("description of {path}")),
        source: "description".into(),
        ..Candidate::default()
    }
}

fn trans(path: &str, score: f32) -> Candidate {
    Candidate {
        id: path.into(),
        video_path: path.into(),
        transcript_score: Some(score),
        transcript: Some(format!("transcript of {path}")),
        source: "transcript".into(),
        ..Candidate::default()
    }
}

fn paths(list: &[Candidate]) -> Vec<&str> {
    list.iter().map(|c| c.video_path.as_str()).collect()
}

#[test]
fn description_only_returns_input_unchanged() {
    let input = vec![desc("a", 0.3), desc("b", 0.9), desc("c", 0.5)];
    let out = Combiner::default().combine(input.clone(), vec![trans("a", 0.99)], SearchMode::DescriptionOnly);
    assert_eq!(out, input);
}

#[test]
fn transcript_only_returns_transcript_list() {
    let input = vec![trans("x", 0.2), trans("y", 0.1)];
    let out = Combiner::default().combine(vec![desc("a", 0.5)], input.clone(), SearchMode::TranscriptOnly);
    assert_eq!(out, input);
}

#[test]
fn disjoint_inputs_or_keeps_all_and_is_empty() {
    let d = vec![desc("a", 0.9), desc("b", 0.4)];
    let t = vec![trans("c", 0.7), trans("d", 0.2)];
    let c = Combiner::default();

    let union = c.combine(d.clone(), t.clone(), SearchMode::Or);
    assert_eq!(paths(&union), ["a", "c", "b", "d"]);
    assert_eq!(union[1].combined_score, Some(0.7));

    assert!(c.combine(d, t, SearchMode::And).is_empty());
}

#[test]
fn overlapping_scores_are_weighted() {
    let out = Combiner::default().combine(
        vec![desc("v", 0.8), desc("w", 0.1)],
        vec![trans("v", 0.5), trans("z", 0.9)],
        SearchMode::Auto,
    );
    assert_eq!(paths(&out), ["v"]);
    let v = &out[0];
    assert!((v.combined_score.expect("combined") - 0.68).abs() < 1e-6);
    assert_eq!(v.description_score, Some(0.8));
    assert_eq!(v.transcript_score, Some(0.5));
    assert_eq!(v.transcript.as_deref(), Some("transcript of v"));
    assert_eq!(v.source, "description,transcript");
}

#[test]
fn union_merges_overlap_and_sorts() {
    let out = Combiner::default().union(
        vec![desc("a", 0.5), desc("b", 0.6)],
        vec![trans("a", 1.0), trans("c", 0.55)],
    );
    // a = 0.6*0.5 + 0.4*1.0 = 0.7
    assert_eq!(paths(&out), ["a", "b", "c"]);
    for c in &out {
        assert!(c.combined_score.is_some());
    }
}

#[test]
fn auto_with_no_overlap_is_union() {
    let out = Combiner::default().combine(vec![desc("a", 0.2)], vec![trans("b", 0.3)], SearchMode::Auto);
    assert_eq!(paths(&out), ["b", "a"]);
}

#[test]
fn auto_with_one_side_empty_returns_other_side() {
    let d = vec![desc("a", 0.2), desc("b", 0.9)];
    let out = Combiner::default().combine(d.clone(), Vec::new(), SearchMode::Auto);
    assert_eq!(out, d);
    assert!(Combiner::default().combine(Vec::new(), Vec::new(), SearchMode::Auto).is_empty());
}

#[test]
fn repeated_path_keeps_first_entry() {
    let out = Combiner::default().union(
        vec![desc("a", 0.9), desc("a", 0.1)],
        vec![trans("a", 0.5), trans("a", 0.0)],
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].description_score, Some(0.9));
    assert_eq!(out[0].transcript_score, Some(0.5));
}

#[test]
fn custom_weights() {
    let c = Combiner::new(ScoreWeights { description: 0.5, transcript: 0.5 });
    let out = c.intersect(vec![desc("v", 0.8)], vec![trans("v", 0.4)]);
    assert!((out[0].combined_score.expect("combined") - 0.6).abs() < 1e-6);
}

#[test]
fn metadata_filter_is_case_insensitive_substring() {
    let mut meta = Meta::new();
    meta.insert("color".into(), "Dark Red, White".into());
    meta.insert("time_of_day".into(), "night".into());

    let mut filters = Filters::new();
    filters.insert("color".into(), "red".into());
    assert!(matches(&meta, &filters));

    filters.insert("time_of_day".into(), "unspecified".into());
    assert!(matches(&meta, &filters));

    filters.insert("orientation".into(), "portrait".into());
    assert!(!matches(&meta, &filters));

    assert!(matches(&meta, &Filters::new()));
    assert!(is_unspecified("  "));
    assert!(is_unspecified("Unspecified"));
}
