//! Static provider table: configuration entries become registered clients.

pub mod azure;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use tracing::{info, warn};

use vidseek_core::config::{LocalModelSettings, ProviderKind, ProviderSettings, Settings};
use vidseek_core::traits::{LocalModel, ProviderClient};

use crate::registry::ProviderRegistry;

pub use azure::azure_provider;
pub use ollama::OllamaModel;
pub use openai::OpenAiCompatProvider;

pub fn build_client(name: &str, settings: &ProviderSettings) -> Option<Arc<dyn ProviderClient>> {
    if settings.base_url.is_empty() || settings.model.is_empty() {
        warn!(provider = name, "provider missing base_url or model, skipped");
        return None;
    }
    let Some(key) = settings.resolve_api_key() else {
        warn!(provider = name, "provider has no API key, skipped");
        return None;
    };
    let client = match settings.kind {
        ProviderKind::OpenAi => OpenAiCompatProvider::new(name, &settings.base_url, key, &settings.model),
        ProviderKind::Azure => {
            azure_provider(name, &settings.base_url, key, &settings.model, settings.api_version.as_deref())
        }
    };
    Some(Arc::new(client.with_sampling(settings.temperature, settings.max_tokens)))
}

/// Registers every prioritised provider that has usable endpoint details.
pub fn build_registry(settings: &Settings) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (name, priority) in &settings.provider_priorities {
        let Some(provider) = settings.providers.get(name) else {
            warn!(provider = %name, "priority configured but no [providers] entry, skipped");
            continue;
        };
        if let Some(client) = build_client(name, provider) {
            registry.register(client, *priority);
        }
    }
    info!(providers = registry.len(), "provider registry ready");
    registry
}

pub fn build_local_model(settings: &LocalModelSettings) -> Option<Arc<dyn LocalModel>> {
    if !settings.enabled {
        return None;
    }
    match OllamaModel::new(&settings.base_url, &settings.model, settings.timeout()) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            warn!(error = %e, "local model unavailable");
            None
        }
    }
}
