//! CLI module for the research server
//!
//! Provides command-line interface parsing and handling for the
//! meta-research-server binary. Uses clap for argument parsing and
//! owo-colors for colored terminal output.

pub mod commands;
pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Meta-Deep Research Server
///
/// Fans one research query out to Gemini, OpenAI and Perplexity deep
/// research agents and merges their reports into a consensus.
#[derive(Parser, Debug)]
#[command(
    name = "meta-research-server",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Meta-Deep Research Server",
    long_about = "Orchestrates parallel deep research across Gemini, OpenAI and Perplexity,\n\
                  then synthesizes one consensus report with deduplicated citations.\n\n\
                  Run without arguments to start the server, or use 'init' to scaffold a new project.",
    after_help = "EXAMPLES:\n    \
                  meta-research-server init                   # Scaffold research.toml and .env.example\n    \
                  meta-research-server                        # Start the server (requires research.toml)\n    \
                  meta-research-server --config my.toml       # Use a custom config file\n    \
                  meta-research-server config --validate      # Check the configuration\n    \
                  meta-research-server agents                 # Show which agents have keys"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "research.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new project with configuration files
    ///
    /// Creates research.toml, .env.example, .gitignore and the data/
    /// directory.
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "5000")]
        port: u16,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// List the research agents and whether each one is configured
    Agents,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
