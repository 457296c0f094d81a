//! LLM integration for mail triage.
//!
//! Supports:
//! - **OpenAI**: Direct API access via rig-core, with strict JSON schema output
//! - **Anthropic**: Direct API access via rig-core
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    Anthropic,
}

impl LlmBackend {
    /// Model used when none is configured.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    /// Whether the backend accepts a JSON schema for its reply.
    pub fn supports_structured_output(self) -> bool {
        matches!(self, Self::OpenAi)
    }

    /// Environment variable holding this backend's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(format!("unknown backend '{other}' (expected openai or anthropic)")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::{anthropic, openai};

    let api_key = config.api_key.expose_secret();
    let provider = match config.backend {
        LlmBackend::OpenAi => {
            let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
                openai::Client::new(api_key).map_err(|e| client_error(config.backend, e))?;
            rig_provider(&client, config)
        }
        LlmBackend::Anthropic => {
            let client: rig::client::Client<anthropic::client::AnthropicExt> =
                anthropic::Client::new(api_key).map_err(|e| client_error(config.backend, e))?;
            rig_provider(&client, config)
        }
    };

    tracing::info!(
        backend = %config.backend,
        model = %config.model,
        structured_output = config.backend.supports_structured_output(),
        "LLM provider ready"
    );
    Ok(provider)
}

/// Wrap one of the client's completion models for `config.model`.
fn rig_provider<C>(client: &C, config: &LlmConfig) -> Arc<dyn LlmProvider>
where
    C: CompletionClient,
    C::CompletionModel: Send + Sync + 'static,
{
    let model = client.completion_model(&config.model);
    Arc::new(
        RigAdapter::new(model, &config.model)
            .with_structured_output(config.backend.supports_structured_output()),
    )
}

fn client_error(backend: LlmBackend, e: impl fmt::Display) -> LlmError {
    LlmError::RequestFailed {
        provider: backend.to_string(),
        reason: format!("Failed to create {backend} client: {e}"),
    }
}
