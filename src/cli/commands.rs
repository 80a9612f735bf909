//! `config` and `agents` subcommands

use super::output::Output;
use crate::agents::AgentKind;
use crate::llm::{GeneratorFactory, GeneratorRole};
use crate::utils::toml_config::{ConfigError, ResearchConfig};
use std::path::Path;

/// Show (and optionally validate) the configuration at `path`.
pub fn show_config(path: &Path, full: bool, validate: bool, output: &Output) -> Result<(), ConfigError> {
    output.header("Configuration");
    output.kv("file", &path.display().to_string());

    let config = match ResearchConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            output.error(&e.to_string());
            if matches!(e, ConfigError::FileNotFound(_)) {
                output.hint("Run 'meta-research-server init' to create one");
            }
            return Err(e);
        }
    };

    output.subheader("Server");
    output.kv("address", &format!("{}:{}", config.server.host, config.server.port));
    output.kv("log", &format!("{} ({})", config.server.log_level, config.server.log_format));

    output.subheader("Polling");
    output.kv("interval", &format!("{}s", config.polling.interval_secs));
    output.kv("max duration", &format!("{}s", config.polling.max_duration_secs));
    output.kv(
        "retries",
        &format!(
            "{} (backoff {:?}s)",
            config.polling.max_retries, config.polling.backoff_secs
        ),
    );
    output.kv(
        "checkpoints",
        config.checkpoint.dir.as_deref().unwrap_or("disabled"),
    );

    if full {
        output.subheader("Full configuration");
        match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => output.warning(&format!("Could not render configuration: {}", e)),
        }
    }

    if validate {
        output.subheader("Validation");
        let warnings = config.validate_with_warnings()?;
        if warnings.is_empty() {
            output.success("Configuration is valid");
        } else {
            output.success("Configuration is valid, with warnings:");
            for warning in &warnings {
                output.warning(&warning.message);
            }
        }
    }

    Ok(())
}

/// One row of the `agents` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReadiness {
    pub name: String,
    pub configured: bool,
    pub detail: String,
}

/// Which agents and generators have credentials under `config`
pub fn readiness(config: &ResearchConfig) -> Vec<AgentReadiness> {
    let mut rows: Vec<AgentReadiness> = AgentKind::ALL
        .into_iter()
        .map(|kind| {
            let endpoint = config.agents.resolve(kind);
            let configured = config.resolve_env(&endpoint.api_key_env).is_some();
            let detail = if configured {
                format!("{} via {}", endpoint.model, endpoint.base_url)
            } else {
                format!("{} not set", endpoint.api_key_env)
            };
            AgentReadiness {
                name: kind.to_string(),
                configured,
                detail,
            }
        })
        .collect();

    let factory = GeneratorFactory::new(config);
    for (role, section) in [
        (GeneratorRole::Planner, config.planner.as_ref()),
        (GeneratorRole::Synthesizer, config.synthesizer.as_ref()),
    ] {
        let configured = factory.is_available(role);
        let detail = match (section, configured) {
            (None, _) => "not configured, using fallback".to_string(),
            (Some(g), true) => format!("provider {}", g.provider),
            (Some(g), false) => format!("provider {} unavailable, using fallback", g.provider),
        };
        rows.push(AgentReadiness {
            name: role.to_string(),
            configured,
            detail,
        });
    }

    rows
}

/// Print [`readiness`] for the configuration at `path`.
pub fn list_agents(path: &Path, output: &Output) -> Result<(), ConfigError> {
    let config = ResearchConfig::load(path).inspect_err(|e| output.error(&e.to_string()))?;

    output.header("Research Agents");
    let rows = readiness(&config);
    let (agents, generators) = rows.split_at(AgentKind::ALL.len());
    for row in agents {
        output.configured(&row.name, row.configured, &row.detail);
    }

    output.subheader("Generators");
    for row in generators {
        output.configured(&row.name, row.configured, &row.detail);
    }

    if !agents.iter().any(|r| r.configured) {
        output.hint("No agent has an API key; every run will fail until at least one is set");
    }
    Ok(())
}
