//! OpenAI-compatible chat completions, shared by the hosted providers
//! (DeepSeek, SiliconFlow, Qwen, GitHub Models and OpenAI itself) and by the
//! Azure deployment flavour.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vidseek_core::traits::ProviderClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Auth {
    Bearer(String),
    ApiKeyHeader(String),
}

pub struct OpenAiCompatProvider {
    name: String,
    url: String,
    auth: Auth,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(name: &str, base_url: &str, api_key: String, model: &str) -> Self {
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Self::with_url(name, url, Auth::Bearer(api_key), model)
    }

    pub(crate) fn with_url(name: &str, url: String, auth: Auth, model: &str) -> Self {
        Self {
            name: name.to_string(),
            url,
            auth,
            model: model.to_string(),
            temperature: None,
            max_tokens: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// Text of the first choice; empty when the model returned no content.
pub(crate) fn parse_chat_response(status: reqwest::StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        let (message, error_type) = match serde_json::from_str::<ApiError>(body) {
            Ok(e) => (e.error.message, e.error.error_type),
            Err(_) => (body.to_string(), None),
        };
        return Err(anyhow!(
            "API error ({}; type={}): {}",
            status,
            error_type.as_deref().unwrap_or("unknown"),
            message
        ));
    }
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("Failed to parse response: {}", e))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No completion choices returned"))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl ProviderClient for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let builder = self.client.post(&self.url).json(&request);
        let builder = match &self.auth {
            Auth::Bearer(key) => builder.bearer_auth(key),
            Auth::ApiKeyHeader(key) => builder.header("api-key", key),
        };
        let response = builder
            .send()
            .await
            .map_err(|e| anyhow!("Request to {} failed: {}", self.name, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response: {}", e))?;
        parse_chat_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn first_choice_text_is_returned() {
        let body = r#"{"choices":[{"message":{"content":"3,1,2"}}]}"#;
        assert_eq!(parse_chat_response(StatusCode::OK, body).expect("ok"), "3,1,2");
    }

    #[test]
    fn null_content_reads_as_empty() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(parse_chat_response(StatusCode::OK, body).expect("ok"), "");
    }

    #[test]
    fn api_errors_carry_type_and_message() {
        let body = r#"{"error":{"message":"rate limited","type":"rate_limit"}}"#;
        let err = parse_chat_response(StatusCode::TOO_MANY_REQUESTS, body).expect_err("error");
        let text = err.to_string();
        assert!(text.contains("rate_limit") && text.contains("rate limited"), "{text}");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let p = OpenAiCompatProvider::new("deepseek", "https://api.deepseek.com/v1/", "k".into(), "deepseek-chat");
        assert_eq!(p.url(), "https://api.deepseek.com/v1/chat/completions");
    }
}
