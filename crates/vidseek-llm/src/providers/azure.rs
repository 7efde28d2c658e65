use super::openai::{Auth, OpenAiCompatProvider};

pub const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Chat completions against an Azure OpenAI deployment. `deployment` is the
/// deployment name, which Azure uses in place of a model id.
pub fn azure_provider(name: &str, endpoint: &str, api_key: String, deployment: &str, api_version: Option<&str>) -> OpenAiCompatProvider {
    let url = format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version.unwrap_or(DEFAULT_API_VERSION)
    );
    OpenAiCompatProvider::with_url(name, url, Auth::ApiKeyHeader(api_key), deployment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_url_includes_api_version() {
        let p = azure_provider("azure", "https://acme.openai.azure.com/", "k".into(), "gpt-4o", None);
        assert_eq!(
            p.url(),
            "https://acme.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
    }
}
