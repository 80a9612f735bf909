//! LLM Provider Clients and Abstractions
//!
//! The plan and synthesis steps each make one text-generation call. This
//! module hides the provider behind two seams:
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`TextGenerator`] - Renders a [`PromptTemplate`] and calls a client
//!
//! [`GeneratorFactory`] builds the planner and synthesizer from
//! `research.toml`.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `anthropic` - Anthropic Claude (default)
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use meta_research::llm::{GeneratorFactory, GeneratorRole, PromptTemplate, TemplateVars};
//!
//! let factory = GeneratorFactory::new(&config);
//! if let Some(planner) = factory.create(GeneratorRole::Planner) {
//!     let plan = planner
//!         .generate(
//!             &PromptTemplate::new("Plan research for: {query}"),
//!             &TemplateVars::new().with("query", "fusion energy"),
//!         )
//!         .await?;
//! }
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
/// Planner/synthesizer construction from configuration.
pub mod provider_registry;
/// Prompt templates and the text-generation seam.
pub mod template;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub mod anthropic;

pub use client::{LLMClient, ModelParams, Provider};
pub use provider_registry::{GeneratorFactory, GeneratorRole};
pub use template::{LlmGenerator, PromptTemplate, TemplateVars, TextGenerator};
