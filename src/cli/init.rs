//! Init command implementation
//!
//! Scaffolds a new project: `research.toml`, `.env.example`, `.gitignore`
//! and the `data/` directory used for checkpoints.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (research.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Research Project");

    let base_path = &config.path;

    let config_path = base_path.join("research.toml");
    if config_path.exists() && !config.force {
        output.warning("research.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");
    let data_dir = base_path.join("data/runs");
    if data_dir.exists() {
        output.skipped("data/runs", "already exists");
    } else if let Err(e) = fs::create_dir_all(&data_dir) {
        output.error(&format!("Failed to create data/runs: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("directory", "data/runs");
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_research_toml(&config), config.force) {
        output.error(&format!("Failed to create research.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "research.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, ENV_EXAMPLE, config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if gitignore_path.exists() {
        output.skipped(".gitignore", "already exists");
    } else if let Err(e) = write_file(&gitignore_path, GITIGNORE, false) {
        output.warning(&format!("Failed to create .gitignore: {}", e));
    } else {
        output.created("file", ".gitignore");
    }

    output.complete("Research project initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Add your API keys:");
    output.command("cp .env.example .env");
    output.command("# Edit .env and set GEMINI_API_KEY, OPENAI_API_KEY, PERPLEXITY_API_KEY, ANTHROPIC_API_KEY");
    output.newline();
    output.info("2. Check which agents are ready:");
    output.command("meta-research-server agents");
    output.newline();
    output.info("3. Start the server:");
    output.command("meta-research-server");

    output.hint(&format!(
        "Server will be available at http://{}:{}",
        config.host, config.port
    ));
    output.hint("API docs available at /swagger-ui/ (requires 'swagger-ui' feature)");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_research_toml(config: &InitConfig) -> String {
    format!(
        r#"# Meta-Deep Research Server configuration
# Secrets are never stored here: each *_env key names an environment variable.

[server]
host = "{host}"
port = {port}
log_level = "info"
# "pretty" or "json"
log_format = "pretty"

# ============= Text generation (planner / synthesizer) =============

[providers.anthropic]
type = "anthropic"
api_key_env = "ANTHROPIC_API_KEY"
default_model = "claude-sonnet-4-20250514"

# Without ANTHROPIC_API_KEY the server falls back to a fixed plan and
# concatenated agent reports.
[planner]
provider = "anthropic"
max_tokens = 500

[synthesizer]
provider = "anthropic"
max_tokens = 6000

# ============= Deep research agents =============

[agents.gemini]
api_key_env = "GEMINI_API_KEY"
model = "deep-research-pro-preview-12-2025"

[agents.openai]
api_key_env = "OPENAI_API_KEY"
model = "o3-deep-research"

[agents.perplexity]
api_key_env = "PERPLEXITY_API_KEY"
model = "sonar-deep-research"

# ============= Orchestration =============

[polling]
interval_secs = 30
max_duration_secs = 3600
max_retries = 3
backoff_secs = [5, 10, 15]

[events]
channel_capacity = 256

[registry]
retention_secs = 3600
sweep_interval_secs = 60

[checkpoint]
dir = "data/runs"

[research]
# Run the plan step before immediate (no-approval) runs
immediate_plan = true
"#,
        host = config.host,
        port = config.port
    )
}

const ENV_EXAMPLE: &str = r#"# Meta-Deep Research Environment Variables
# ========================================
# Copy this file to .env and fill in the values.

# Deep research agents (an agent without a key fails at dispatch)
GEMINI_API_KEY=
OPENAI_API_KEY=
PERPLEXITY_API_KEY=

# Planner and synthesizer
ANTHROPIC_API_KEY=

# Optional: Logging level (trace, debug, info, warn, error)
RUST_LOG=info,meta_research=debug
"#;

const GITIGNORE: &str = r#"# Run checkpoints
/data/

# Environment
.env
.env.local
.env.*.local

# Rust
/target/

# OS
.DS_Store
Thumbs.db
"#;
