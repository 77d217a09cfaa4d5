//! Declarative team files.
//!
//! A team file names the participants, how the next speaker is chosen, and
//! what stops a run:
//!
//! ```toml
//! topology = "round_robin"
//!
//! [[agents]]
//! name = "writer"
//! system_message = "You write short poems."
//!
//! [[agents]]
//! name = "critic"
//! system_message = "Reply TERMINATE when the poem is good."
//!
//! [termination]
//! type = "any"
//! [[termination.conditions]]
//! type = "text_mention"
//! text = "TERMINATE"
//! [[termination.conditions]]
//! type = "max_messages"
//! max_messages = 6
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A complete team definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Participants, in turn order
    #[serde(default)]
    pub agents: Vec<AgentSpec>,

    /// Speaker-selection policy
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Prompt template for the selector topology.
    /// Placeholders: `{roles}`, `{history}`, `{participants}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_prompt: Option<String>,

    /// Whether the selector may pick the previous speaker again
    #[serde(default)]
    pub allow_repeated_speaker: bool,

    /// Stop condition; without one only the turn ceiling ends a run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationConfig>,

    /// Overrides `team.max_turns` from the app config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<usize>,
}

/// One participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,

    /// Used by the selector to decide who speaks
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub kind: AgentKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Overrides the app's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Built-in tool names (e.g. `file_write`, `memory_search`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Participants this agent may hand off to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handoffs: Vec<String>,

    /// Facts loaded into this agent's memory before the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory: Vec<MemoryFact>,

    #[serde(default)]
    pub reflect_on_tool_use: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Backed by a model
    #[default]
    Assistant,
    /// Backed by a human at the console
    UserProxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub content: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyConfig {
    #[default]
    RoundRobin,
    Selector,
    Swarm,
}

/// A termination condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminationConfig {
    /// Stop when a message contains `text`
    TextMention {
        text: String,
        /// Only messages from these sources count; empty means any source
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sources: Vec<String>,
    },
    /// Stop after this many messages in the run
    MaxMessages { max_messages: usize },
    /// Stop when `source` produces a plain text reply
    TextMessage { source: String },
    /// Any child satisfied
    Any { conditions: Vec<TerminationConfig> },
    /// All children satisfied
    All { conditions: Vec<TerminationConfig> },
}

impl TerminationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::TextMention { text, .. } if text.is_empty() => Err(ConfigError::ValidationError(
                "text_mention needs a non-empty text".into(),
            )),
            Self::MaxMessages { max_messages: 0 } => Err(ConfigError::ValidationError(
                "max_messages must be > 0".into(),
            )),
            Self::Any { conditions } | Self::All { conditions } => {
                if conditions.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "any/all termination needs at least one condition".into(),
                    ));
                }
                conditions.iter().try_for_each(Self::validate)
            }
            _ => Ok(()),
        }
    }
}

impl TeamConfig {
    /// Load a team file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let team: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        team.validate()?;
        Ok(team)
    }

    /// Field-level checks. Structural checks (empty team, duplicate names,
    /// unknown handoff targets) happen when the team is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == Some(0) {
            return Err(ConfigError::ValidationError("max_turns must be > 0".into()));
        }
        if let Some(termination) = &self.termination {
            termination.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWARM: &str = r#"
topology = "swarm"
max_turns = 20

[[agents]]
name = "planner"
description = "Plans the trip"
system_message = "Plan, then hand off."
handoffs = ["flights", "customer"]

[[agents]]
name = "flights"
tools = ["memory_search"]
handoffs = ["planner"]
reflect_on_tool_use = true

[[agents.memory]]
content = "The user prefers aisle seats"
metadata = { category = "preferences" }

[[agents]]
name = "customer"
kind = "user_proxy"

[termination]
type = "any"

[[termination.conditions]]
type = "text_mention"
text = "TERMINATE"

[[termination.conditions]]
type = "text_message"
source = "customer"
"#;

    #[test]
    fn parse_swarm_team() {
        let team: TeamConfig = toml::from_str(SWARM).unwrap();
        assert_eq!(team.topology, TopologyConfig::Swarm);
        assert_eq!(team.max_turns, Some(20));
        assert_eq!(team.agents.len(), 3);
        assert_eq!(team.agents[0].handoffs, vec!["flights", "customer"]);
        assert!(team.agents[1].reflect_on_tool_use);
        assert_eq!(team.agents[1].memory[0].metadata["category"], "preferences");
        assert_eq!(team.agents[2].kind, AgentKind::UserProxy);
        assert!(team.validate().is_ok());

        let Some(TerminationConfig::Any { conditions }) = &team.termination else {
            panic!("expected any-termination");
        };
        assert_eq!(conditions.len(), 2);
        assert_eq!(
            conditions[1],
            TerminationConfig::TextMessage {
                source: "customer".into()
            }
        );
    }

    #[test]
    fn defaults_are_round_robin_without_termination() {
        let team: TeamConfig = toml::from_str("[[agents]]\nname = \"solo\"\n").unwrap();
        assert_eq!(team.topology, TopologyConfig::RoundRobin);
        assert!(team.termination.is_none());
        assert!(!team.allow_repeated_speaker);
        assert_eq!(team.agents[0].kind, AgentKind::Assistant);
    }

    #[test]
    fn nested_zero_max_messages_rejected() {
        let team = TeamConfig {
            agents: vec![],
            topology: TopologyConfig::RoundRobin,
            selector_prompt: None,
            allow_repeated_speaker: false,
            termination: Some(TerminationConfig::All {
                conditions: vec![TerminationConfig::MaxMessages { max_messages: 0 }],
            }),
            max_turns: None,
        };
        assert!(team.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_fails() {
        let err = TeamConfig::load_from(Path::new("/nonexistent/team.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team.toml");
        std::fs::write(&path, SWARM).unwrap();
        let team = TeamConfig::load_from(&path).unwrap();
        assert_eq!(team.agents[0].name, "planner");
    }
}
