//! Metadata post-filter and validation of the enumerable filter fields.

use tracing::debug;

use vidseek_core::config::FilterSettings;
use vidseek_core::types::{Filters, Meta};

/// Values a model uses to say "no constraint".
pub const UNSPECIFIED: [&str; 2] = ["unspecified", "未指定"];

pub const TIME_OF_DAY_KEY: &str = "time_of_day";
pub const COLOR_KEY: &str = "color";
pub const ORIENTATION_KEY: &str = "orientation";

pub fn is_unspecified(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || UNSPECIFIED.iter().any(|u| v.eq_ignore_ascii_case(u))
}

/// Every filter key must exist in `metadata` and its value must contain the
/// filter value, ignoring case. Unspecified filter values are skipped.
pub fn matches(metadata: &Meta, filters: &Filters) -> bool {
    filters.iter().filter(|(_, v)| !is_unspecified(v)).all(|(key, wanted)| {
        metadata
            .get(key)
            .is_some_and(|have| have.to_lowercase().contains(&wanted.trim().to_lowercase()))
    })
}

/// Closed value sets for `time_of_day`, `color` and `orientation`.
#[derive(Debug, Clone)]
pub struct FilterVocabulary {
    time_of_day: Vec<String>,
    time_of_day_default: String,
    colors: Vec<String>,
    orientations: Vec<String>,
}

impl Default for FilterVocabulary {
    fn default() -> Self {
        Self::from(&FilterSettings::default())
    }
}

impl From<&FilterSettings> for FilterVocabulary {
    fn from(s: &FilterSettings) -> Self {
        Self {
            time_of_day: s.time_of_day.clone(),
            time_of_day_default: s.time_of_day_default.clone(),
            colors: s.colors.clone(),
            orientations: s.orientations.clone(),
        }
    }
}

fn canonical<'a>(allowed: &'a [String], value: &str) -> Option<&'a String> {
    let v = value.trim();
    allowed.iter().find(|a| a.eq_ignore_ascii_case(v))
}

impl FilterVocabulary {
    /// Unspecified values are dropped before anything else. Invalid time of
    /// day becomes the default; invalid color or orientation is dropped;
    /// other keys pass through. Known values are canonicalised.
    pub fn validate(&self, mut filters: Filters) -> Filters {
        filters.retain(|_, v| !is_unspecified(v));
        if let Some(v) = filters.get_mut(TIME_OF_DAY_KEY) {
            let fixed = canonical(&self.time_of_day, v).unwrap_or(&self.time_of_day_default).clone();
            if *v != fixed {
                debug!(given = %v, used = %fixed, "time_of_day filter normalised");
            }
            *v = fixed;
        }
        for (key, allowed) in [(COLOR_KEY, &self.colors), (ORIENTATION_KEY, &self.orientations)] {
            let Some(v) = filters.get(key) else { continue };
            match canonical(allowed, v).cloned() {
                Some(c) => {
                    filters.insert(key.to_string(), c);
                }
                None => {
                    debug!(key, value = %v, "dropping filter outside vocabulary");
                    filters.remove(key);
                }
            }
        }
        filters
    }
}
