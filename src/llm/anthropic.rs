//! Anthropic Claude LLM client implementation
//!
//! Used for the plan and synthesis steps.
//!
//! # Features
//!
//! Enable with the `anthropic` feature flag (on by default).
//!
//! # Example
//!
//! ```rust,ignore
//! use meta_research::llm::{LLMClient, ModelParams, Provider};
//!
//! let provider = Provider::Anthropic {
//!     api_key: "sk-ant-...".to_string(),
//!     model: "claude-sonnet-4-20250514".to_string(),
//!     params: ModelParams::default(),
//! };
//! let client = provider.create_client()?;
//! let plan = client.generate("Create a brief research plan for ...").await?;
//! ```

use crate::llm::client::{LLMClient, ModelParams};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use claude_sdk::{ClaudeClient, ContentBlock, Message, MessagesRequest};

/// Anthropic Claude client for API-based inference
pub struct AnthropicClient {
    client: ClaudeClient,
    model: String,
    params: ModelParams,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `model` - Model identifier (e.g., "claude-sonnet-4-20250514")
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_params(api_key, model, ModelParams::default())
    }

    /// Create a new Anthropic client with model parameters
    pub fn with_params(api_key: String, model: String, params: ModelParams) -> Self {
        let client = ClaudeClient::anthropic(api_key);

        Self {
            client,
            model,
            params,
        }
    }

    /// Get the max tokens, defaulting to 1024 if not specified
    fn max_tokens(&self) -> u32 {
        self.params.max_tokens.unwrap_or(1024)
    }

    /// Extract text content from Claude response content blocks
    fn extract_text_content(content: &[ContentBlock]) -> String {
        content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn build_request(&self, prompt: &str, system: Option<&str>) -> MessagesRequest {
        let messages = vec![Message::user(prompt.to_string())];
        let mut request = MessagesRequest::new(self.model.clone(), self.max_tokens(), messages);

        if let Some(temp) = self.params.temperature {
            request = request.with_temperature(temp);
        }

        if let Some(sys) = system {
            request = request.with_system(sys.to_string());
        }

        request
    }

    async fn send(&self, request: MessagesRequest) -> Result<String> {
        let response = self
            .client
            .send_message(request)
            .await
            .map_err(|e| AppError::LLM(format!("Anthropic API error: {}", e)))?;

        let text = Self::extract_text_content(&response.content);
        if text.trim().is_empty() {
            return Err(AppError::LLM("Empty response from Anthropic".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.send(self.build_request(prompt, None)).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.send(self.build_request(prompt, Some(system))).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
