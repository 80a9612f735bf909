//! # Meta-Deep Research Server
//!
//! Fans one research query out to three asynchronous deep-research agents
//! (Gemini, OpenAI, Perplexity), polls them to completion and merges their
//! reports into a single consensus report with deduplicated citations.
//!
//! ## Overview
//!
//! The crate can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `meta-research-server` binary
//! 2. **As a library** - Embed [`ResearchService`] in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use meta_research::{ResearchConfigManager, ResearchService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config_manager = Arc::new(ResearchConfigManager::new("research.toml")?);
//!     let service = ResearchService::from_config_manager(config_manager);
//!
//!     let started = service.start_immediate("How do solid-state batteries fail?")?;
//!     service.wait_for(&started.run_id).await;
//!
//!     let run = service.get_status(&started.run_id).await?;
//!     println!("{}", run.consensus_report.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `anthropic` | Anthropic Claude planner/synthesizer (default) |
//! | `openai` | OpenAI planner/synthesizer |
//! | `swagger-ui` | Interactive API documentation |
//!
//! ## Modules
//!
//! - [`agents`] - Clients for the external deep-research agents
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`llm`] - Text generation for the plan and synthesis steps
//! - [`research`] - Run orchestration, polling, events and citations
//! - [`types`] - Common request/response types and error handling
//! - [`utils`] - TOML configuration with hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// External deep-research agent clients.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Multi-agent research orchestration.
pub mod research;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use agents::{AgentClient, AgentKind, AgentSet};
pub use llm::{LLMClient, Provider, TextGenerator};
pub use research::{ResearchDeps, ResearchRun, ResearchService, RunSnapshot, RunStatus};
pub use types::{AppError, Result};
pub use utils::toml_config::{ResearchConfig, ResearchConfigManager};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<ResearchConfigManager>,
    /// Research run service
    pub service: Arc<ResearchService>,
}

impl AppState {
    /// Build the state, constructing the service from the current configuration
    pub fn new(config_manager: Arc<ResearchConfigManager>) -> Self {
        let service = Arc::new(ResearchService::from_config_manager(Arc::clone(
            &config_manager,
        )));
        Self {
            config_manager,
            service,
        }
    }
}
