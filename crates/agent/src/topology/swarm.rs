//! Swarm: the active agent keeps the floor until it hands off.

use std::sync::Arc;

use async_trait::async_trait;
use crewloop_core::agent::Agent;
use crewloop_core::error::TeamError;
use crewloop_core::message::{Message, MessageKind};
use tracing::{debug, info};

use super::{Topology, position_of};

/// Handoff-driven speaker selection.
///
/// Starts with the first participant, or with the target of the last legal
/// handoff in a seeded history. A handoff to a target the sender did not
/// declare leaves the sender active; the run loop answers it with a
/// rejection.
#[derive(Debug, Default)]
pub struct Swarm {
    active: usize,
    /// History length already scanned for handoffs
    seen: usize,
}

impl Swarm {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Check a handoff from `from` to `target` and return the target's position.
pub fn resolve_handoff(
    participants: &[Arc<dyn Agent>],
    from: &str,
    target: &str,
) -> Result<usize, TeamError> {
    let declared = position_of(participants, from)
        .is_some_and(|i| participants[i].handoffs().iter().any(|h| h == target));
    match position_of(participants, target) {
        Some(i) if declared => Ok(i),
        _ => Err(TeamError::IllegalHandoff {
            from: from.to_string(),
            target: target.to_string(),
        }),
    }
}

#[async_trait]
impl Topology for Swarm {
    fn name(&self) -> &'static str {
        "swarm"
    }

    async fn next_speaker(
        &mut self,
        history: &[Message],
        participants: &[Arc<dyn Agent>],
    ) -> usize {
        for message in &history[self.seen.min(history.len())..] {
            if message.kind == MessageKind::Handoff
                && let Some(target) = &message.handoff_target
            {
                match resolve_handoff(participants, &message.source, target) {
                    Ok(i) => {
                        info!(from = %message.source, to = %target, "Handoff");
                        self.active = i;
                    }
                    Err(e) => debug!(error = %e, "Ignoring handoff"),
                }
            }
        }
        self.seen = history.len();
        self.active
    }
}
