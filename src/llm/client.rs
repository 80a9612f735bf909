//! LLM Client abstractions and provider management
//!
//! The research pipeline needs exactly one kind of LLM call: turn a rendered
//! prompt (plus an optional system prompt) into text. Providers:
//! - **Anthropic**: Claude via `claude-sdk` (feature `anthropic`, default)
//! - **OpenAI**: chat completions via `async-openai` (feature `openai`),
//!   including OpenAI-compatible endpoints through `api_base`

use crate::types::{AppError, Result};
use async_trait::async_trait;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Inference parameters shared by all providers
#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// Anthropic Claude API provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Anthropic {
    ///     api_key: "sk-ant-...".to_string(),
    ///     model: "claude-sonnet-4-20250514".to_string(),
    ///     params: ModelParams::default(),
    /// };
    /// ```
    Anthropic {
        api_key: String,
        model: String,
        params: ModelParams,
    },

    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the provider's cargo feature is not
    /// enabled in this build.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "anthropic")]
            Provider::Anthropic {
                api_key,
                model,
                params,
            } => Ok(Box::new(super::anthropic::AnthropicClient::with_params(
                api_key.clone(),
                model.clone(),
                params.clone(),
            ))),

            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::openai::OpenAIClient::with_params(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                params.clone(),
            ))),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} provider is not enabled in this build (enable the `{}` feature)",
                other.name(),
                other.feature()
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Anthropic { .. } => "Anthropic",
            Provider::OpenAI { .. } => "OpenAI",
        }
    }

    /// Cargo feature that compiles this provider in
    pub fn feature(&self) -> &'static str {
        match self {
            Provider::Anthropic { .. } => "anthropic",
            Provider::OpenAI { .. } => "openai",
        }
    }

    /// Whether this build can create a client for this provider
    pub fn is_available(&self) -> bool {
        match self {
            Provider::Anthropic { .. } => cfg!(feature = "anthropic"),
            Provider::OpenAI { .. } => cfg!(feature = "openai"),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Anthropic { model, .. } | Provider::OpenAI { model, .. } => model,
        }
    }
}
