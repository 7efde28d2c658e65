//! Union and intersection of description and transcript results.
//!
//! Videos are joined on `video_path`. When a path repeats within one list the
//! first (best-scored) entry is used and later ones are ignored. Output order
//! is fully determined by the inputs: ties keep first-seen order.

use std::collections::HashMap;

use vidseek_core::config::SearchSettings;
use vidseek_core::types::{Candidate, SearchMode, SOURCE_DESCRIPTION, SOURCE_TRANSCRIPT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub description: f32,
    pub transcript: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { description: 0.6, transcript: 0.4 }
    }
}

impl From<&SearchSettings> for ScoreWeights {
    fn from(s: &SearchSettings) -> Self {
        Self { description: s.description_weight, transcript: s.transcript_weight }
    }
}

impl ScoreWeights {
    pub fn combine(&self, description: f32, transcript: f32) -> f32 {
        self.description * description + self.transcript * transcript
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Combiner {
    weights: ScoreWeights,
}

fn sort_by_rank(list: &mut [Candidate]) {
    list.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
}

fn merged_source() -> String {
    format!("{SOURCE_DESCRIPTION},{SOURCE_TRANSCRIPT}")
}

impl Combiner {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    pub fn combine(&self, description: Vec<Candidate>, transcript: Vec<Candidate>, mode: SearchMode) -> Vec<Candidate> {
        match mode {
            SearchMode::DescriptionOnly => description,
            SearchMode::TranscriptOnly => transcript,
            SearchMode::Or => self.union(description, transcript),
            SearchMode::And => self.intersect(description, transcript),
            SearchMode::Auto => {
                if transcript.is_empty() {
                    return description;
                }
                if description.is_empty() {
                    return transcript;
                }
                let both = self.intersect(description.clone(), transcript.clone());
                if both.is_empty() {
                    self.union(description, transcript)
                } else {
                    both
                }
            }
        }
    }

    /// Fold a transcript hit into the description entry for the same video.
    fn merge_into(&self, target: &mut Candidate, other: Candidate) {
        let d = target.description_score.unwrap_or(0.0);
        let t = other.transcript_score.unwrap_or(0.0);
        target.transcript_score = other.transcript_score;
        target.combined_score = Some(self.weights.combine(d, t));
        if target.transcript.is_none() {
            target.transcript = other.transcript;
        }
        for (k, v) in other.metadata {
            target.metadata.entry(k).or_insert(v);
        }
        target.source = merged_source();
    }

    /// Every video from either list. If one list is empty the other is
    /// returned as is.
    pub fn union(&self, description: Vec<Candidate>, transcript: Vec<Candidate>) -> Vec<Candidate> {
        if description.is_empty() {
            return transcript;
        }
        if transcript.is_empty() {
            return description;
        }
        let mut out: Vec<Candidate> = Vec::with_capacity(description.len() + transcript.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for mut c in description {
            if index.contains_key(&c.video_path) {
                continue;
            }
            c.combined_score = c.description_score;
            index.insert(c.video_path.clone(), out.len());
            out.push(c);
        }
        for mut c in transcript {
            match index.get(&c.video_path).copied() {
                Some(pos) => {
                    if out[pos].transcript_score.is_none() {
                        self.merge_into(&mut out[pos], c);
                    }
                }
                None => {
                    c.combined_score = c.transcript_score;
                    index.insert(c.video_path.clone(), out.len());
                    out.push(c);
                }
            }
        }
        sort_by_rank(&mut out);
        out
    }

    /// Only videos found in both lists, each with a weighted combined score.
    pub fn intersect(&self, description: Vec<Candidate>, transcript: Vec<Candidate>) -> Vec<Candidate> {
        if description.is_empty() || transcript.is_empty() {
            return Vec::new();
        }
        let mut by_path: HashMap<String, Candidate> = HashMap::new();
        for c in transcript {
            by_path.entry(c.video_path.clone()).or_insert(c);
        }
        let mut out = Vec::new();
        for mut c in description {
            if let Some(t) = by_path.remove(&c.video_path) {
                self.merge_into(&mut c, t);
                out.push(c);
            }
        }
        sort_by_rank(&mut out);
        out
    }
}
