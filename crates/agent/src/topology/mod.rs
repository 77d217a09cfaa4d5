//! Speaker selection strategies.
//!
//! A topology decides which participant speaks next. It is created fresh for
//! every run and reads only the shared history, so a seeded history resumes
//! where the previous run left off.

pub mod round_robin;
pub mod selector;
pub mod swarm;

use std::sync::Arc;

use async_trait::async_trait;
use crewloop_core::agent::Agent;
use crewloop_core::message::Message;

pub use round_robin::RoundRobin;
pub use selector::{
    Candidate, DEFAULT_SELECTOR_PROMPT, ModelSpeakerSelector, Selector, SpeakerSelector,
    parse_selection,
};
pub use swarm::{Swarm, resolve_handoff};

/// Per-run speaker selection state.
#[async_trait]
pub trait Topology: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Index into `participants` of the next speaker. `history` is the full
    /// shared history, including any seeded messages and the task.
    async fn next_speaker(&mut self, history: &[Message], participants: &[Arc<dyn Agent>])
    -> usize;
}

/// Which strategy a team uses. Instantiated once per run.
#[derive(Clone)]
pub enum TopologyKind {
    RoundRobin,
    Selector {
        selector: Arc<dyn SpeakerSelector>,
        allow_repeated_speaker: bool,
    },
    Swarm,
}

impl TopologyKind {
    pub fn selector(selector: Arc<dyn SpeakerSelector>) -> Self {
        Self::Selector {
            selector,
            allow_repeated_speaker: false,
        }
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Topology> {
        match self {
            Self::RoundRobin => Box::new(RoundRobin),
            Self::Selector {
                selector,
                allow_repeated_speaker,
            } => Box::new(Selector::new(selector.clone(), *allow_repeated_speaker)),
            Self::Swarm => Box::new(Swarm::new()),
        }
    }
}

impl std::fmt::Debug for TopologyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => f.write_str("RoundRobin"),
            Self::Selector {
                allow_repeated_speaker,
                ..
            } => f
                .debug_struct("Selector")
                .field("allow_repeated_speaker", allow_repeated_speaker)
                .finish_non_exhaustive(),
            Self::Swarm => f.write_str("Swarm"),
        }
    }
}

/// Position of the participant named `name`.
pub(crate) fn position_of(participants: &[Arc<dyn Agent>], name: &str) -> Option<usize> {
    participants.iter().position(|a| a.name() == name)
}

/// Index of the participant that authored the most recent participant
/// message. Messages from the task author are skipped.
pub(crate) fn last_speaker(history: &[Message], participants: &[Arc<dyn Agent>]) -> Option<usize> {
    history
        .iter()
        .rev()
        .find_map(|m| position_of(participants, &m.source))
}

/// The participant after the last speaker, wrapping around; the first
/// participant when nobody has spoken yet.
pub(crate) fn rotate(history: &[Message], participants: &[Arc<dyn Agent>]) -> usize {
    last_speaker(history, participants).map_or(0, |i| (i + 1) % participants.len())
}
