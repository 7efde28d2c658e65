//! Layered configuration and path helpers.
//!
//! Figment merges `config.toml`, then `config.<env>.toml` chosen by `RUST_ENV`,
//! then `APP_*` environment variables (`__` separates nested keys, so
//! `APP_SEARCH__DESCRIPTION_WEIGHT=0.7` sets `search.description_weight`).

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Single TOML file plus `APP_*` overrides; no environment layering.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("APP_").split("__"));
        Self { figment }
    }

    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::from(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The full typed settings tree, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if matches!(env, "prod" | "production")
            && settings.provider_priorities.is_empty()
            && !settings.local_model.enabled
        {
            return Err(Error::InvalidConfig(
                "production needs at least one provider or the local model".into(),
            )
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub router: RouterSettings,
    /// Provider name to base priority; lower is tried first.
    pub provider_priorities: BTreeMap<String, u32>,
    pub providers: BTreeMap<String, ProviderSettings>,
    pub local_model: LocalModelSettings,
    pub search: SearchSettings,
    pub filters: FilterSettings,
    pub prompts: PromptSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if s.description_weight < 0.0 || s.transcript_weight < 0.0 {
            return Err(Error::InvalidConfig("search weights must not be negative".into()));
        }
        if s.description_weight + s.transcript_weight <= 0.0 {
            return Err(Error::InvalidConfig("search weights must sum to a positive value".into()));
        }
        for (name, call) in [("parse", &self.router.parse), ("rerank", &self.router.rerank)] {
            if call.max_retries == 0 {
                return Err(Error::InvalidConfig(format!("router.{name}.max_retries must be at least 1")));
            }
            if call.timeout_secs <= 0.0 || call.retry_delay_secs < 0.0 {
                return Err(Error::InvalidConfig(format!("router.{name} durations out of range")));
            }
        }
        let f = &self.filters;
        if f.time_of_day.is_empty() || f.colors.is_empty() || f.orientations.is_empty() {
            return Err(Error::InvalidConfig("filter vocabularies must not be empty".into()));
        }
        if !f.time_of_day.iter().any(|v| v.eq_ignore_ascii_case(&f.time_of_day_default)) {
            return Err(Error::InvalidConfig(format!(
                "filters.time_of_day_default '{}' is not in filters.time_of_day",
                f.time_of_day_default
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub lancedb_dir: String,
    pub table: String,
    pub catalog_path: Option<String>,
    pub model_dir: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            lancedb_dir: "~/.vidseek/lancedb".into(),
            table: "video_documents".into(),
            catalog_path: Some("~/.vidseek/catalog.db".into()),
            model_dir: None,
        }
    }
}

impl StoreSettings {
    pub fn lancedb_path(&self) -> PathBuf {
        expand_path(&self.lancedb_dir)
    }

    pub fn catalog_file(&self) -> Option<PathBuf> {
        self.catalog_path.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub cooldown_secs: u64,
    pub parse: CallSettings,
    pub rerank: CallSettings,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            parse: CallSettings { max_retries: 3, retry_delay_secs: 2.0, timeout_secs: 60.0 },
            rerank: CallSettings { max_retries: 3, retry_delay_secs: 2.0, timeout_secs: 100.0 },
        }
    }
}

impl RouterSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Retry schedule for one kind of router call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CallSettings {
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub timeout_secs: f64,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self { max_retries: 3, retry_delay_secs: 2.0, timeout_secs: 60.0 }
    }
}

impl CallSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs.max(0.0))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.0))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Azure,
}

/// Endpoint details for one named provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub api_version: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ProviderSettings {
    /// Inline key first, then the named environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key_env.as_deref().and_then(|var| env::var(var).ok()))
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalModelSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: f64,
}

impl Default for LocalModelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".into(),
            model: "qwen2.5:7b-instruct".into(),
            max_tokens: 2048,
            temperature: 0.0,
            timeout_secs: 120.0,
        }
    }
}

impl LocalModelSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub description_weight: f32,
    pub transcript_weight: f32,
    /// Description candidates requested per result slot.
    pub description_oversample: usize,
    pub min_description_candidates: usize,
    pub transcript_candidates: usize,
    pub rerank_max_candidates: usize,
    pub apply_metadata_filters: bool,
    pub attach_transcripts: bool,
    pub deadline_secs: Option<f64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            description_weight: 0.6,
            transcript_weight: 0.4,
            description_oversample: 10,
            min_description_candidates: 50,
            transcript_candidates: 100,
            rerank_max_candidates: 50,
            apply_metadata_filters: true,
            attach_transcripts: true,
            deadline_secs: None,
        }
    }
}

impl SearchSettings {
    pub fn description_candidates(&self, limit: usize) -> usize {
        limit.saturating_mul(self.description_oversample).max(self.min_description_candidates)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.filter(|s| *s > 0.0).map(Duration::from_secs_f64)
    }
}

/// Closed vocabularies for the enumerable metadata filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub time_of_day: Vec<String>,
    pub time_of_day_default: String,
    pub colors: Vec<String>,
    pub orientations: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        Self {
            time_of_day: words(&["day", "night"]),
            time_of_day_default: "day".into(),
            colors: words(&["red", "orange", "yellow", "green", "blue", "black", "white", "gray"]),
            orientations: words(&["landscape", "portrait", "square"]),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory whose `<template>.md` files override the built-in prompts.
    pub dir: Option<String>,
}

impl PromptSettings {
    pub fn dir_path(&self) -> Option<PathBuf> {
        self.dir.as_deref().map(expand_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
