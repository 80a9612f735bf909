//! Integration tests for the TOML configuration system
//!
//! These tests verify that the configuration works end-to-end:
//! - Loading, validation and warnings
//! - Reloading through the config manager
//! - Building agents and generators from config
//! - A full run against mocked agent endpoints

use meta_research::agents::AgentKind;
use meta_research::llm::{GeneratorFactory, GeneratorRole};
use meta_research::utils::toml_config::{ConfigError, ConfigWarningKind, ResearchConfig};
use meta_research::{AgentSet, ResearchConfigManager, ResearchDeps, ResearchService, RunStatus};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test helper: write `content` as research.toml in a fresh directory
fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("research.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

const FULL_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 7000
log_format = "json"

[providers.claude]
type = "anthropic"
api_key_env = "MR_TOML_TEST_UNSET_ANTHROPIC"
default_model = "claude-sonnet-4-20250514"

[planner]
provider = "claude"
max_tokens = 400

[synthesizer]
provider = "claude"
template = "Merge for {query}:\n{reports}"

[agents.gemini]
api_key_env = "MR_TOML_TEST_UNSET_GEMINI"
base_url = "https://gemini.example/v1beta"

[agents.openai]
api_key_env = "MR_TOML_TEST_UNSET_OPENAI"
model = "o4-mini-deep-research"
max_tokens = 8000

[agents.perplexity]
api_key_env = "MR_TOML_TEST_UNSET_PERPLEXITY"
prompt = "Dig into {query}"

[polling]
interval_secs = 15
max_duration_secs = 900
max_retries = 2
backoff_secs = [1, 2]
"#;

#[test]
fn test_config_loading_and_defaults() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = ResearchConfig::load(&path).unwrap();

    assert_eq!(config.server.port, 7000);
    assert_eq!(config.server.log_format, "json");
    assert_eq!(config.server.log_level, "info");
    assert_eq!(config.polling.max_retries, 2);
    assert_eq!(config.events.channel_capacity, 256);
    assert!(config.checkpoint.dir.is_none());
    assert!(config.research.immediate_plan);

    let gemini = config.agents.resolve(AgentKind::Gemini);
    assert_eq!(gemini.base_url, "https://gemini.example/v1beta");
    assert_eq!(gemini.api_key_env, "MR_TOML_TEST_UNSET_GEMINI");

    let openai = config.agents.resolve(AgentKind::OpenAI);
    assert_eq!(openai.model, "o4-mini-deep-research");
    assert_eq!(openai.max_tokens, Some(8000));

    let perplexity = config.agents.resolve(AgentKind::Perplexity);
    assert_eq!(perplexity.model, "sonar-deep-research");
    assert_eq!(perplexity.prompt.as_deref(), Some("Dig into {query}"));
}

#[test]
fn test_empty_config_uses_defaults() {
    let (_dir, path) = write_config("");
    let config = ResearchConfig::load(&path).unwrap();

    assert_eq!(config.server.port, 5000);
    assert_eq!(config.polling.interval_secs, 30);
    assert_eq!(config.polling.max_duration_secs, 3600);
    assert_eq!(config.polling.backoff_secs, vec![5, 10, 15]);
    assert_eq!(config.agents.resolve(AgentKind::Gemini).api_key_env, "GEMINI_API_KEY");
    assert!(config.planner.is_none());
}

#[test]
fn test_config_with_warnings() {
    let (_dir, path) = write_config(&format!(
        "{}\n[providers.spare]\ntype = \"openai\"\napi_key_env = \"MR_TOML_TEST_UNSET_SPARE\"\ndefault_model = \"gpt-4o\"\n",
        FULL_CONFIG
    ));
    let config = ResearchConfig::load(&path).unwrap();
    let warnings = config.validate_with_warnings().unwrap();

    let count = |kind: ConfigWarningKind| warnings.iter().filter(|w| w.kind == kind).count();
    assert_eq!(count(ConfigWarningKind::UnusedProvider), 1);
    assert_eq!(count(ConfigWarningKind::MissingProviderKey), 2);
    assert_eq!(count(ConfigWarningKind::MissingAgentKey), 3);
    assert!(
        warnings
            .iter()
            .any(|w| w.message.contains("'spare'"))
    );
}

#[test]
fn test_missing_provider_rejected() {
    let (_dir, path) = write_config("[planner]\nprovider = \"ghost\"\n");

    match ResearchConfig::load(&path) {
        Err(ConfigError::MissingProvider(name, role)) => {
            assert_eq!(name, "ghost");
            assert_eq!(role, "planner");
        }
        other => panic!("expected missing provider, got {:?}", other),
    }
}

#[test]
fn test_invalid_values_rejected() {
    for content in [
        "[polling]\ninterval_secs = 0\n",
        "[polling]\nbackoff_secs = []\n",
        "[events]\nchannel_capacity = 0\n",
        "[agents.openai]\nbase_url = \"not a url\"\n",
    ] {
        let (_dir, path) = write_config(content);
        assert!(
            matches!(ResearchConfig::load(&path), Err(ConfigError::ValidationError(_))),
            "accepted: {}",
            content
        );
    }

    let (_dir, path) = write_config("[polling\n");
    assert!(matches!(
        ResearchConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_config_manager_reload() {
    let (_dir, path) = write_config("[polling]\ninterval_secs = 20\n");
    let manager = ResearchConfigManager::new(&path).unwrap();
    assert_eq!(manager.config().polling.interval_secs, 20);

    fs::write(&path, "[polling]\ninterval_secs = 45\n").unwrap();
    manager.reload().unwrap();
    assert_eq!(manager.config().polling.interval_secs, 45);

    // A broken file leaves the previous configuration in place
    fs::write(&path, "[polling]\ninterval_secs = 0\n").unwrap();
    assert!(manager.reload().is_err());
    assert_eq!(manager.config().polling.interval_secs, 45);

    let clone = manager.clone();
    assert_eq!(clone.config_path(), manager.config_path());
    assert_eq!(clone.config().polling.interval_secs, 45);
}

#[test]
fn test_generators_and_agents_without_keys() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = ResearchConfig::load(&path).unwrap();

    let factory = GeneratorFactory::new(&config);
    assert!(!factory.is_available(GeneratorRole::Planner));
    assert!(factory.create(GeneratorRole::Synthesizer).is_none());
    assert_eq!(
        factory.template(GeneratorRole::Synthesizer),
        Some("Merge for {query}:\n{reports}")
    );
    assert!(factory.template(GeneratorRole::Planner).is_none());

    let agents = AgentSet::from_config(&config);
    for kind in AgentKind::ALL {
        assert!(!agents.is_configured(kind));
        assert_eq!(agents.get(kind).kind(), kind);
    }
}

#[tokio::test]
async fn test_full_run_from_config() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gemini/interactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "int-9"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gemini/interactions/int-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "int-9",
            "status": "completed",
            "outputs": [{"type": "text", "text": "Gemini says yes", "annotations": [
                {"url": "https://example.org/paper?utm_campaign=x", "title": "Paper"}
            ]}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/openai/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "resp_9", "status": "queued"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openai/responses/resp_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_9",
            "status": "completed",
            "output": [{"type": "message", "content": [{
                "type": "output_text",
                "text": "OpenAI agrees",
                "annotations": [{"type": "url_citation", "url": "https://example.org/paper", "title": "Paper"}]
            }]}]
        })))
        .mount(&server)
        .await;

    // SAFETY: the variable names are unique to this test
    unsafe {
        std::env::set_var("MR_TOML_TEST_RUN_GEMINI", "g-key");
        std::env::set_var("MR_TOML_TEST_RUN_OPENAI", "o-key");
    }

    let checkpoints = TempDir::new().unwrap();
    let (_dir, path) = write_config(&format!(
        r#"
[agents.gemini]
api_key_env = "MR_TOML_TEST_RUN_GEMINI"
base_url = "{uri}/gemini"

[agents.openai]
api_key_env = "MR_TOML_TEST_RUN_OPENAI"
base_url = "{uri}/openai"

[agents.perplexity]
api_key_env = "MR_TOML_TEST_RUN_UNSET_PERPLEXITY"

[polling]
interval_secs = 1
max_duration_secs = 30

[checkpoint]
dir = "{checkpoints}"
"#,
        uri = server.uri(),
        checkpoints = checkpoints.path().display()
    ));

    let manager = Arc::new(ResearchConfigManager::new(&path).unwrap());
    let deps = ResearchDeps::from_config(&manager.config());
    assert!(deps.agents.is_configured(AgentKind::Gemini));
    assert!(!deps.agents.is_configured(AgentKind::Perplexity));

    let service = ResearchService::new(manager, deps);
    let started = service.start_immediate("Does it work?").unwrap();
    assert_eq!(
        service.wait_for(&started.run_id).await,
        Some(RunStatus::Completed)
    );

    let run = service.get_status(&started.run_id).await.unwrap();
    let perplexity = run.agent(AgentKind::Perplexity);
    assert!(
        perplexity
            .error
            .as_deref()
            .unwrap()
            .contains("MR_TOML_TEST_RUN_UNSET_PERPLEXITY")
    );

    let report = run.consensus_report.unwrap();
    assert!(report.contains("## Gemini Research Report\n\nGemini says yes"));
    assert!(report.contains("## OpenAI Research Report\n\nOpenAI agrees"));

    assert_eq!(run.citations.len(), 1);
    assert_eq!(run.citations[0].url, "https://example.org/paper");
    assert_eq!(run.citations[0].agents.len(), 2);
}
