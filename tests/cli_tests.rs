//! CLI Integration Tests
//!
//! Exercises argument parsing and the init, config and agents commands
//! through the library, in temporary directories.

use clap::Parser;
use meta_research::cli::commands::{list_agents, readiness, show_config};
use meta_research::cli::init::{self, InitConfig, InitResult};
use meta_research::cli::output::Output;
use meta_research::cli::{Cli, Commands};
use meta_research::utils::toml_config::{ConfigError, ResearchConfig};
use meta_research::ResearchConfigManager;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn init_in(path: &Path, force: bool) -> InitResult {
    init::run(
        InitConfig {
            path: path.to_path_buf(),
            force,
            host: "127.0.0.1".to_string(),
            port: 5000,
        },
        &Output::no_color(),
    )
}

// =============================================================================
// Argument Parsing
// =============================================================================

#[test]
fn test_no_subcommand_starts_server() {
    let cli = Cli::try_parse_from(["meta-research-server"]).unwrap();
    assert!(cli.command.is_none());
    assert_eq!(cli.config, Path::new("research.toml"));
    assert!(!cli.verbose);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "meta-research-server",
        "agents",
        "--config",
        "/etc/research.toml",
        "--no-color",
    ])
    .unwrap();

    assert!(matches!(cli.command, Some(Commands::Agents)));
    assert_eq!(cli.config, Path::new("/etc/research.toml"));
    assert!(cli.no_color);
}

#[test]
fn test_init_arguments() {
    let cli = Cli::try_parse_from([
        "meta-research-server",
        "init",
        "/tmp/project",
        "--force",
        "--host",
        "0.0.0.0",
        "--port",
        "8088",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            host,
            port,
        }) => {
            assert_eq!(path, Path::new("/tmp/project"));
            assert!(force);
            assert_eq!(host, "0.0.0.0");
            assert_eq!(port, 8088);
        }
        other => panic!("expected init, got {:?}", other),
    }
}

#[test]
fn test_invalid_port_rejected() {
    assert!(Cli::try_parse_from(["meta-research-server", "init", "--port", "http"]).is_err());
}

// =============================================================================
// Init Command
// =============================================================================

#[test]
fn test_init_then_load_with_manager() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(init_in(dir.path(), false), InitResult::Success));

    let manager = ResearchConfigManager::new(dir.path().join("research.toml")).unwrap();
    let config = manager.config();
    assert_eq!(config.server.port, 5000);
    assert!(config.planner.is_some());
    assert!(config.synthesizer.is_some());
    assert_eq!(config.checkpoint.dir.as_deref(), Some("data/runs"));
}

#[test]
fn test_init_twice_requires_force() {
    let dir = TempDir::new().unwrap();
    init_in(dir.path(), false);
    fs::write(dir.path().join("research.toml"), "[server]\nport = 1\n").unwrap();

    assert!(matches!(init_in(dir.path(), false), InitResult::AlreadyExists));
    let kept = ResearchConfig::load(dir.path().join("research.toml")).unwrap();
    assert_eq!(kept.server.port, 1);

    assert!(matches!(init_in(dir.path(), true), InitResult::Success));
    let replaced = ResearchConfig::load(dir.path().join("research.toml")).unwrap();
    assert_eq!(replaced.server.port, 5000);
}

// =============================================================================
// Config and Agents Commands
// =============================================================================

#[test]
fn test_config_command_on_initialized_project() {
    let dir = TempDir::new().unwrap();
    init_in(dir.path(), false);

    let path = dir.path().join("research.toml");
    show_config(&path, true, true, &Output::no_color()).unwrap();
    list_agents(&path, &Output::no_color()).unwrap();
}

#[test]
fn test_config_command_reports_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("research.toml");
    fs::write(&path, "[synthesizer]\nprovider = \"missing\"\n").unwrap();

    assert!(matches!(
        show_config(&path, false, true, &Output::no_color()),
        Err(ConfigError::MissingProvider(_, _))
    ));
    assert!(list_agents(&path, &Output::no_color()).is_err());
}

#[test]
fn test_readiness_with_agent_key_set() {
    // SAFETY: the variable name is unique to this test
    unsafe {
        std::env::set_var("MR_CLI_TEST_PERPLEXITY_KEY", "pplx");
    }
    let config: ResearchConfig = toml::from_str(
        r#"
[agents.perplexity]
api_key_env = "MR_CLI_TEST_PERPLEXITY_KEY"
base_url = "https://pplx.example"
"#,
    )
    .unwrap();

    let rows = readiness(&config);
    let perplexity = rows.iter().find(|r| r.name == "perplexity").unwrap();
    assert!(perplexity.configured);
    assert_eq!(perplexity.detail, "sonar-deep-research via https://pplx.example");

    let synthesizer = rows.iter().find(|r| r.name == "synthesizer").unwrap();
    assert!(!synthesizer.configured);
    assert_eq!(synthesizer.detail, "not configured, using fallback");
}
