use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vidseek_core::config::CallSettings;

use crate::registry::{FailureKind, ProviderHandle, ProviderRegistry};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("provider '{provider}' timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("provider '{provider}' returned an empty response")]
    EmptyResponse { provider: String },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("no providers available")]
    NoProvidersAvailable,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Attempts per provider, pause between them, and the per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, retry_delay: Duration::from_secs(2), timeout: Duration::from_secs(60) }
    }
}

impl From<&CallSettings> for RetryPolicy {
    fn from(s: &CallSettings) -> Self {
        Self { max_retries: s.max_retries.max(1), retry_delay: s.retry_delay(), timeout: s.timeout() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Use only this provider, ignoring its cooldown.
    pub provider: Option<String>,
    pub policy: RetryPolicy,
    pub deadline: Option<Instant>,
}

impl InvokeOptions {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { provider: None, policy, deadline: None }
    }

    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub provider: String,
    pub text: String,
}

/// Picks providers from the shared registry and runs a prompt with
/// per-attempt timeouts, retries, and failover.
pub struct Router {
    registry: Arc<ProviderRegistry>,
    cooldown: Duration,
}

impl Router {
    pub fn new(registry: Arc<ProviderRegistry>, cooldown: Duration) -> Self {
        Self { registry, cooldown }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    fn candidates(&self, opts: &InvokeOptions) -> Result<Vec<ProviderHandle>, RouterError> {
        match &opts.provider {
            Some(name) => self
                .registry
                .handle(name)
                .map(|h| vec![h])
                .ok_or_else(|| RouterError::UnknownProvider(name.clone())),
            None => Ok(self.registry.eligible(self.cooldown)),
        }
    }

    pub async fn invoke(&self, prompt: &str, opts: &InvokeOptions) -> Result<Routed, RouterError> {
        let candidates = self.candidates(opts)?;
        if candidates.is_empty() {
            warn!("no eligible providers");
            return Err(RouterError::NoProvidersAvailable);
        }
        let policy = opts.policy;
        let attempts = policy.max_retries.max(1);
        let mut last_err: Option<RouterError> = None;

        for handle in &candidates {
            for attempt in 1..=attempts {
                let limit = match opts.deadline {
                    Some(deadline) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            return Err(last_err.unwrap_or(RouterError::DeadlineExceeded));
                        }
                        remaining.min(policy.timeout)
                    }
                    None => policy.timeout,
                };
                let capped = limit < policy.timeout;

                let started = Instant::now();
                let outcome = tokio::time::timeout(limit, handle.client.complete(prompt)).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let provider = handle.name.as_str();

                let err = match outcome {
                    Ok(Ok(text)) if !text.trim().is_empty() => {
                        self.registry.record_success(provider);
                        info!(provider, attempt, elapsed_ms, outcome = "ok", "provider call succeeded");
                        return Ok(Routed { provider: handle.name.clone(), text });
                    }
                    Ok(Ok(_)) => {
                        self.registry.record_failure(provider, FailureKind::Empty);
                        warn!(provider, attempt, elapsed_ms, outcome = FailureKind::Empty.as_str(), "provider call failed");
                        RouterError::EmptyResponse { provider: handle.name.clone() }
                    }
                    Ok(Err(e)) => {
                        self.registry.record_failure(provider, FailureKind::Error);
                        warn!(provider, attempt, elapsed_ms, outcome = FailureKind::Error.as_str(), error = %e, "provider call failed");
                        RouterError::Provider { provider: handle.name.clone(), message: e.to_string() }
                    }
                    Err(_) if capped => {
                        // The caller's budget ran out, not the provider's; no penalty.
                        debug!(provider, attempt, elapsed_ms, outcome = "deadline", "caller deadline reached");
                        return Err(RouterError::DeadlineExceeded);
                    }
                    Err(_) => {
                        self.registry.record_failure(provider, FailureKind::Timeout);
                        warn!(provider, attempt, elapsed_ms, outcome = FailureKind::Timeout.as_str(), "provider call timed out");
                        RouterError::Timeout { provider: handle.name.clone(), after: limit }
                    }
                };
                last_err = Some(err);

                if attempt < attempts && !policy.retry_delay.is_zero() {
                    if let Some(deadline) = opts.deadline {
                        if Instant::now() + policy.retry_delay >= deadline {
                            debug!(provider, "retry delay would pass the deadline, failing over");
                            break;
                        }
                    }
                    tokio::time::sleep(policy.retry_delay).await;
                }
            }
            debug!(provider = %handle.name, attempts, "provider exhausted, failing over");
        }

        Err(last_err.unwrap_or(RouterError::NoProvidersAvailable))
    }
}
