//! Builds the planner and synthesizer generators from configuration
//!
//! A generator is *unavailable* when its section is missing, its provider's
//! API key is not set, or the provider's feature is not compiled in. The
//! orchestrator then falls back to the deterministic plan or report.

use crate::llm::client::{ModelParams, Provider};
use crate::llm::template::{LlmGenerator, TextGenerator};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{GeneratorConfig, ProviderConfig, ResearchConfig};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorRole {
    Planner,
    Synthesizer,
}

impl GeneratorRole {
    fn default_max_tokens(self) -> u32 {
        match self {
            GeneratorRole::Planner => 500,
            GeneratorRole::Synthesizer => 6000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorRole::Planner => "planner",
            GeneratorRole::Synthesizer => "synthesizer",
        }
    }
}

impl fmt::Display for GeneratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Provider {
    /// Resolve a generator section and its provider into a concrete provider
    pub fn from_generator_config(
        generator: &GeneratorConfig,
        provider: &ProviderConfig,
        api_key: String,
        role: GeneratorRole,
    ) -> Self {
        let params = ModelParams {
            temperature: generator.temperature,
            max_tokens: Some(generator.max_tokens.unwrap_or(role.default_max_tokens())),
        };
        let model = generator
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());

        match provider {
            ProviderConfig::Anthropic { .. } => Provider::Anthropic {
                api_key,
                model,
                params,
            },
            ProviderConfig::OpenAI { api_base, .. } => Provider::OpenAI {
                api_key,
                api_base: api_base.clone(),
                model,
                params,
            },
        }
    }
}

/// Creates text generators for the plan and synthesis steps
pub struct GeneratorFactory<'a> {
    config: &'a ResearchConfig,
}

impl<'a> GeneratorFactory<'a> {
    pub fn new(config: &'a ResearchConfig) -> Self {
        Self { config }
    }

    fn section(&self, role: GeneratorRole) -> Option<&'a GeneratorConfig> {
        match role {
            GeneratorRole::Planner => self.config.planner.as_ref(),
            GeneratorRole::Synthesizer => self.config.synthesizer.as_ref(),
        }
    }

    /// Resolve the provider for `role`.
    ///
    /// `Ok(None)` means the role is simply not configured or its key is unset.
    pub fn provider(&self, role: GeneratorRole) -> Result<Option<Provider>> {
        let Some(generator) = self.section(role) else {
            return Ok(None);
        };

        let provider_config = self
            .config
            .get_provider(&generator.provider)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "Provider '{}' referenced by {} not found",
                    generator.provider, role
                ))
            })?;

        let Some(api_key) = self.config.resolve_env(provider_config.api_key_env()) else {
            return Ok(None);
        };

        Ok(Some(Provider::from_generator_config(
            generator,
            provider_config,
            api_key,
            role,
        )))
    }

    /// The generator's prompt template override, if any
    pub fn template(&self, role: GeneratorRole) -> Option<&'a str> {
        self.section(role).and_then(|g| g.template.as_deref())
    }

    /// Build the generator for `role`, or `None` when it is unavailable.
    pub fn create(&self, role: GeneratorRole) -> Option<Arc<dyn TextGenerator>> {
        let provider = match self.provider(role) {
            Ok(Some(provider)) => provider,
            Ok(None) => {
                tracing::info!(role = %role, "No {} configured, using fallback", role);
                return None;
            }
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Invalid {} configuration", role);
                return None;
            }
        };

        match provider.create_client() {
            Ok(client) => {
                tracing::info!(
                    role = %role,
                    provider = provider.name(),
                    model = client.model_name(),
                    "Text generator ready"
                );
                let system_prompt = self.section(role).and_then(|g| g.system_prompt.clone());
                Some(Arc::new(
                    LlmGenerator::new(Arc::from(client)).with_system_prompt(system_prompt),
                ))
            }
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Text generator unavailable");
                None
            }
        }
    }

    pub fn is_available(&self, role: GeneratorRole) -> bool {
        matches!(self.provider(role), Ok(Some(p)) if p.is_available())
    }
}
