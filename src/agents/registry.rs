//! The fixed set of agent clients used by every run
//!
//! Every run fans out to exactly three agents. [`AgentSet`] always holds a
//! client for each [`AgentKind`]; an agent whose API key is missing gets an
//! [`UnconfiguredAgent`] so the slot fails at dispatch instead of the whole
//! run failing.

use super::gemini::GeminiClient;
use super::openai::OpenAIResearchClient;
use super::perplexity::PerplexityClient;
use super::{AgentClient, AgentError, AgentKind, AgentRequest, PollUpdate};
use crate::utils::toml_config::ResearchConfig;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stand-in for an agent without credentials.
pub struct UnconfiguredAgent {
    kind: AgentKind,
    api_key_env: String,
}

impl UnconfiguredAgent {
    pub fn new(kind: AgentKind, api_key_env: impl Into<String>) -> Self {
        Self {
            kind,
            api_key_env: api_key_env.into(),
        }
    }
}

#[async_trait]
impl AgentClient for UnconfiguredAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn submit(&self, _request: &AgentRequest) -> Result<String, AgentError> {
        Err(AgentError::Dispatch(format!(
            "{} not configured",
            self.api_key_env
        )))
    }

    async fn poll(&self, _job_id: &str) -> Result<PollUpdate, AgentError> {
        Err(AgentError::Poll(format!("{} not configured", self.api_key_env)))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// One client per agent slot
#[derive(Clone)]
pub struct AgentSet {
    clients: BTreeMap<AgentKind, Arc<dyn AgentClient>>,
}

impl AgentSet {
    /// Build the three HTTP clients from configuration, resolving API keys
    /// from the environment.
    pub fn from_config(config: &ResearchConfig) -> Self {
        let clients = AgentKind::ALL
            .into_iter()
            .map(|kind| {
                let endpoint = config.agents.resolve(kind);
                let client: Arc<dyn AgentClient> = match config.resolve_env(&endpoint.api_key_env)
                {
                    Some(key) => match kind {
                        AgentKind::Gemini => Arc::new(GeminiClient::new(
                            key,
                            &endpoint.base_url,
                            endpoint.request_timeout,
                        )),
                        AgentKind::OpenAI => Arc::new(OpenAIResearchClient::new(
                            key,
                            &endpoint.base_url,
                            endpoint.request_timeout,
                        )),
                        AgentKind::Perplexity => Arc::new(PerplexityClient::new(
                            key,
                            &endpoint.base_url,
                            endpoint.request_timeout,
                        )),
                    },
                    None => {
                        tracing::warn!(
                            agent = %kind,
                            env = %endpoint.api_key_env,
                            "Agent API key not set, agent will fail at dispatch"
                        );
                        Arc::new(UnconfiguredAgent::new(kind, endpoint.api_key_env))
                    }
                };
                (kind, client)
            })
            .collect();

        Self { clients }
    }

    /// Build a set from explicit clients. Slots without a client are
    /// filled with [`UnconfiguredAgent`].
    pub fn from_clients(clients: impl IntoIterator<Item = Arc<dyn AgentClient>>) -> Self {
        let mut map: BTreeMap<AgentKind, Arc<dyn AgentClient>> =
            clients.into_iter().map(|c| (c.kind(), c)).collect();

        for kind in AgentKind::ALL {
            map.entry(kind).or_insert_with(|| {
                Arc::new(UnconfiguredAgent::new(
                    kind,
                    format!("{}_API_KEY", kind.as_str().to_ascii_uppercase()),
                ))
            });
        }

        Self { clients: map }
    }

    pub fn get(&self, kind: AgentKind) -> Arc<dyn AgentClient> {
        // Both constructors fill every slot.
        Arc::clone(&self.clients[&kind])
    }

    pub fn is_configured(&self, kind: AgentKind) -> bool {
        self.clients.get(&kind).is_some_and(|c| c.is_configured())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentKind, &Arc<dyn AgentClient>)> {
        self.clients.iter().map(|(kind, client)| (*kind, client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentParams;

    #[tokio::test]
    async fn test_unconfigured_agent_fails_dispatch_permanently() {
        let agent = UnconfiguredAgent::new(AgentKind::Gemini, "GEMINI_API_KEY");
        let request = AgentRequest {
            query: "q".to_string(),
            params: AgentParams {
                model: "m".to_string(),
                prompt: "p".to_string(),
                max_tokens: None,
            },
        };

        let err = agent.submit(&request).await.unwrap_err();
        assert_eq!(
            err,
            AgentError::Dispatch("GEMINI_API_KEY not configured".to_string())
        );
        assert!(!err.is_transient());
        assert!(!agent.is_configured());
    }

    #[test]
    fn test_from_clients_fills_every_slot() {
        let set = AgentSet::from_clients(Vec::new());
        assert_eq!(set.iter().count(), 3);
        for kind in AgentKind::ALL {
            assert_eq!(set.get(kind).kind(), kind);
            assert!(!set.is_configured(kind));
        }
    }

    #[test]
    fn test_from_config_without_keys_is_unconfigured() {
        let config: ResearchConfig = toml::from_str(
            r#"
[agents.gemini]
api_key_env = "META_RESEARCH_TEST_NO_GEMINI"
[agents.openai]
api_key_env = "META_RESEARCH_TEST_NO_OPENAI"
[agents.perplexity]
api_key_env = "META_RESEARCH_TEST_NO_PPLX"
"#,
        )
        .unwrap();

        let set = AgentSet::from_config(&config);
        assert!(AgentKind::ALL.iter().all(|k| !set.is_configured(*k)));
    }
}
