//! Language-model access for query parsing and reranking: provider registry,
//! routing with retries and cooldown, prompt templates, and the
//! remote-then-local completion chain.

pub mod chain;
pub mod prompt;
pub mod providers;
pub mod registry;
pub mod router;

pub use chain::{ChainError, Completion, CompletionChain, CompletionOrigin, LocalParams};
pub use prompt::{PromptTemplates, TemplateName};
pub use registry::{FailureKind, ProviderRegistry, ProviderStatus};
pub use router::{InvokeOptions, RetryPolicy, Routed, Router, RouterError};
