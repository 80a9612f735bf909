//! Prompt templates and the text-generation seam used by plan and synthesis.

use crate::llm::client::LLMClient;
use crate::types::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A prompt with `{name}` placeholders.
///
/// Placeholders without a value are left in the output untouched, so
/// literal braces in a template survive rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, vars: &TemplateVars) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match after.find(['}', '{']) {
                Some(close) if after.as_bytes()[close] == b'}' => {
                    let name = &after[..close];
                    match vars.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl From<&str> for PromptTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PromptTemplate {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Values substituted into a [`PromptTemplate`]
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// One abstracted text-generation call
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, template: &PromptTemplate, vars: &TemplateVars) -> Result<String>;

    /// Model identifier, for logs
    fn model_name(&self) -> &str;
}

/// [`TextGenerator`] backed by any [`LLMClient`]
pub struct LlmGenerator {
    client: Arc<dyn LLMClient>,
    system_prompt: Option<String>,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            client,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, template: &PromptTemplate, vars: &TemplateVars) -> Result<String> {
        let prompt = template.render(vars);
        match &self.system_prompt {
            Some(system) => self.client.generate_with_system(system, &prompt).await,
            None => self.client.generate(&prompt).await,
        }
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}
