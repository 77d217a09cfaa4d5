//! Build a [`Team`] from a declarative team file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crewloop_config::{AgentKind, AgentSpec, AppConfig, TeamConfig, TopologyConfig};
use crewloop_core::agent::Agent;
use crewloop_core::error::Error;
use crewloop_core::memory::{MemoryBackend, MemoryEntry};
use crewloop_core::provider::Provider;
use crewloop_memory::InMemoryVectorStore;
use crewloop_tools::{ToolContext, build_registry};
use tracing::debug;

use crate::assistant::{AssistantAgent, RecallPolicy};
use crate::dispatcher::ToolDispatcher;
use crate::team::Team;
use crate::termination::Termination;
use crate::topology::{ModelSpeakerSelector, TopologyKind};
use crate::user_proxy::{InputFn, UserProxyAgent};

/// Turns a [`TeamConfig`] into a runnable [`Team`].
///
/// Every assistant (and the selector, for the selector topology) shares one
/// provider. Memory facts are loaded into a per-agent in-memory store.
pub struct TeamBuilder {
    app: AppConfig,
    provider: Arc<dyn Provider>,
    input: Option<InputFn>,
    output_dir: Option<PathBuf>,
}

impl TeamBuilder {
    pub fn new(app: AppConfig, provider: Arc<dyn Provider>) -> Self {
        Self {
            app,
            provider,
            input: None,
            output_dir: None,
        }
    }

    /// Input source for `user_proxy` agents.
    pub fn with_input(mut self, input: InputFn) -> Self {
        self.input = Some(input);
        self
    }

    /// Root directory for the `file_write` tool.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub async fn build(&self, config: &TeamConfig) -> Result<Team, Error> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let mut participants = Vec::with_capacity(config.agents.len());
        for spec in &config.agents {
            participants.push(self.build_agent(spec).await?);
        }

        let topology = match config.topology {
            TopologyConfig::RoundRobin => TopologyKind::RoundRobin,
            TopologyConfig::Swarm => TopologyKind::Swarm,
            TopologyConfig::Selector => {
                let mut selector =
                    ModelSpeakerSelector::new(self.provider.clone(), &self.app.default_model);
                if let Some(prompt) = &config.selector_prompt {
                    selector = selector.with_template(prompt);
                }
                TopologyKind::Selector {
                    selector: Arc::new(selector),
                    allow_repeated_speaker: config.allow_repeated_speaker,
                }
            }
        };

        let mut dispatcher = ToolDispatcher::new();
        if let Some(secs) = self.app.team.tool_timeout_secs {
            dispatcher = dispatcher.with_timeout(Duration::from_secs(secs));
        }

        let mut team = Team::new(participants, topology)?
            .with_max_turns(config.max_turns.unwrap_or(self.app.team.max_turns))
            .with_dispatcher(dispatcher);
        if let Some(termination) = &config.termination {
            team = team.with_termination(Termination::from_config(termination));
        }
        debug!(team = ?team, "Team built");
        Ok(team)
    }

    async fn build_agent(&self, spec: &AgentSpec) -> Result<Arc<dyn Agent>, Error> {
        if spec.kind == AgentKind::UserProxy {
            let input = self.input.clone().ok_or_else(|| Error::Config {
                message: format!("agent '{}' is a user_proxy but no input source is set", spec.name),
            })?;
            let mut proxy = UserProxyAgent::new(&spec.name, input);
            if !spec.description.is_empty() {
                proxy = proxy.with_description(&spec.description);
            }
            if !spec.handoffs.is_empty() {
                proxy = proxy.with_handoffs(spec.handoffs.clone());
            }
            return Ok(Arc::new(proxy));
        }

        let memory = self.load_memory(spec).await?;
        let tools = build_registry(
            &spec.tools,
            &ToolContext {
                memory: memory.clone(),
                output_dir: self.output_dir.clone(),
                score_threshold: self.app.memory.score_threshold,
            },
        )?;

        let model = spec.model.as_deref().unwrap_or(&self.app.default_model);
        let mut agent = AssistantAgent::new(&spec.name, self.provider.clone(), model)
            .with_temperature(self.app.default_temperature)
            .with_max_tokens(self.app.default_max_tokens)
            .with_tools(tools)
            .with_handoffs(spec.handoffs.iter().cloned())
            .with_reflect_on_tool_use(spec.reflect_on_tool_use)
            .with_recall(RecallPolicy {
                top_k: self.app.memory.top_k,
                score_threshold: self.app.memory.score_threshold,
            });
        if !spec.description.is_empty() {
            agent = agent.with_description(&spec.description);
        }
        if let Some(system_message) = &spec.system_message {
            agent = agent.with_system_message(system_message);
        }
        if let Some(memory) = memory {
            agent = agent.with_memory(memory);
        }
        Ok(Arc::new(agent))
    }

    async fn load_memory(&self, spec: &AgentSpec) -> Result<Option<Arc<dyn MemoryBackend>>, Error> {
        if spec.memory.is_empty() {
            return Ok(None);
        }
        let store = InMemoryVectorStore::new();
        for fact in &spec.memory {
            let entry = fact
                .metadata
                .iter()
                .fold(MemoryEntry::new(&fact.content), |entry, (k, v)| {
                    entry.with_metadata(k, v.as_str())
                });
            store.store(entry).await?;
        }
        debug!(agent = %spec.name, facts = spec.memory.len(), "Memory loaded");
        Ok(Some(Arc::new(store)))
    }
}
