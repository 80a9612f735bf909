//! meta-research-server entry point
//!
//! - `meta-research-server` - Start the HTTP server
//! - `meta-research-server init` - Scaffold a new project
//! - `meta-research-server config` - Show or validate the configuration
//! - `meta-research-server agents` - Show which agents are configured

use anyhow::Context;
use meta_research::{
    AppState, ResearchConfigManager,
    api::routes::build_app,
    cli::{
        Cli, Commands, commands,
        init::{self, InitConfig, InitResult},
        output::Output,
    },
    utils::toml_config::ServerConfig,
};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // A missing .env is normal in production
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            host,
            port,
        }) => match init::run(
            InitConfig {
                path,
                force,
                host,
                port,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => anyhow::bail!("init failed: {}", e),
        },
        Some(Commands::Config { full, validate }) => {
            commands::show_config(&cli.config, full, validate, &output)?;
            Ok(())
        }
        Some(Commands::Agents) => {
            commands::list_agents(&cli.config, &output)?;
            Ok(())
        }
        None => serve(cli, &output).await,
    }
}

fn init_tracing(server: &ServerConfig, verbose: bool) {
    let default_directive = if verbose {
        "debug".to_string()
    } else {
        format!(
            "{level},meta_research={level},tower_http={level}",
            level = server.log_level
        )
    };
    // RUST_LOG wins over the config file unless --verbose was given
    let filter = if verbose {
        EnvFilter::new(default_directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if server.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(cli: Cli, output: &Output) -> anyhow::Result<()> {
    let config_manager = match ResearchConfigManager::new(&cli.config) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            output.error(&format!("Failed to load {}: {}", cli.config.display(), e));
            output.hint("Run 'meta-research-server init' to create a configuration");
            return Err(e).context("loading configuration");
        }
    };

    let config = config_manager.config();
    init_tracing(&config.server, cli.verbose);
    output.banner();

    match config.validate_with_warnings() {
        Ok(warnings) => {
            for warning in warnings {
                tracing::warn!(kind = ?warning.kind, "{}", warning.message);
            }
        }
        Err(e) => return Err(e).context("validating configuration"),
    }

    if let Err(e) = config_manager.start_watching() {
        tracing::warn!(error = %e, "Config hot reload disabled");
    }

    let state = AppState::new(Arc::clone(&config_manager));
    let shutdown = CancellationToken::new();
    let sweeper = state.service.spawn_sweeper(shutdown.clone());

    let app = build_app(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(address = %addr, "Meta-Deep Research server listening");
    output.success(&format!("Listening on http://{}", addr));

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            signal.cancel();
        })
        .await
        .context("serving HTTP")?;

    shutdown.cancel();
    config_manager.stop_watching();
    let _ = sweeper.await;
    Ok(())
}
