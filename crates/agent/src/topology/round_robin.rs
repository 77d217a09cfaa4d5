//! Round-robin: participants speak in fixed cyclic order.

use std::sync::Arc;

use async_trait::async_trait;
use crewloop_core::agent::Agent;
use crewloop_core::message::Message;

use super::{Topology, rotate};

/// Speaker after the last one to speak; the first participant on a fresh
/// history.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

#[async_trait]
impl Topology for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    async fn next_speaker(
        &mut self,
        history: &[Message],
        participants: &[Arc<dyn Agent>],
    ) -> usize {
        rotate(history, participants)
    }
}
