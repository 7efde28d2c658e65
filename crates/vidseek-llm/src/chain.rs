//! Remote-then-local completion.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use vidseek_core::traits::LocalModel;

use crate::router::{InvokeOptions, Router, RouterError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOrigin {
    Remote(String),
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub origin: CompletionOrigin,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("remote providers failed and no local model is configured: {0}")]
    RemoteOnly(RouterError),

    #[error("local model failed: {0}")]
    Local(String),

    #[error("no language model configured")]
    Unavailable,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LocalParams {
    fn default() -> Self {
        Self { max_tokens: 2048, temperature: 0.0 }
    }
}

/// The router when remote is preferred, then the local model.
#[derive(Clone, Default)]
pub struct CompletionChain {
    router: Option<Arc<Router>>,
    local: Option<Arc<dyn LocalModel>>,
    local_params: LocalParams,
}

impl CompletionChain {
    pub fn new(router: Option<Arc<Router>>, local: Option<Arc<dyn LocalModel>>, local_params: LocalParams) -> Self {
        Self { router, local, local_params }
    }

    pub fn router(&self) -> Option<&Arc<Router>> {
        self.router.as_ref()
    }

    pub async fn complete(&self, prompt: &str, prefer_remote: bool, opts: &InvokeOptions) -> Result<Completion, ChainError> {
        let mut remote_err = None;
        if prefer_remote {
            if let Some(router) = &self.router {
                match router.invoke(prompt, opts).await {
                    Ok(routed) => {
                        return Ok(Completion { text: routed.text, origin: CompletionOrigin::Remote(routed.provider) });
                    }
                    Err(e) => {
                        warn!(error = %e, "remote completion failed, trying local model");
                        remote_err = Some(e);
                    }
                }
            }
        }

        let Some(local) = &self.local else {
            return Err(match remote_err {
                Some(e) => ChainError::RemoteOnly(e),
                None => ChainError::Unavailable,
            });
        };

        let call = local.generate(prompt, self.local_params.max_tokens, self.local_params.temperature);
        let result = match opts.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                Ok(r) => r,
                Err(_) => {
                    warn!("deadline reached during local completion");
                    return Err(ChainError::DeadlineExceeded);
                }
            },
            None => call.await,
        };

        match result {
            Ok(text) if !text.trim().is_empty() => {
                info!(origin = "local", chars = text.len(), "local completion succeeded");
                Ok(Completion { text, origin: CompletionOrigin::Local })
            }
            Ok(_) => {
                warn!(origin = "local", "local model returned an empty response");
                Err(ChainError::Local("empty response".into()))
            }
            Err(e) => {
                warn!(origin = "local", error = %e, "local completion failed");
                Err(ChainError::Local(e.to_string()))
            }
        }
    }
}
