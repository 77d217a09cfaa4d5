//! The turn-taking run loop, the heart of crewloop.
//!
//! A [`Team`] runs its participants over one shared history:
//!
//! 1. **Append** the caller's task
//! 2. **Pick** the next speaker via the team's topology
//! 3. **Act**: the speaker produces exactly one message
//! 4. **Dispatch** any tool calls it requested and append the results
//! 5. **Stop** when the termination condition holds, the turn ceiling is
//!    reached, or the caller cancels
//!
//! Every appended message is yielded from [`Team::submit`] as it happens;
//! the stream ends with the [`RunResult`].

pub mod assistant;
pub mod builder;
pub mod dispatcher;
pub mod stream_event;
pub mod team;
pub mod termination;
pub mod topology;
pub mod user_proxy;
pub mod validation;

#[cfg(test)]
mod test_helpers;

pub use assistant::{AssistantAgent, RecallPolicy};
pub use builder::TeamBuilder;
pub use dispatcher::ToolDispatcher;
pub use stream_event::{RunEvent, RunResult, StopReason};
pub use team::{DEFAULT_MAX_TURNS, MAX_REJECTED_HANDOFFS, RunRequest, RunStream, Team};
pub use termination::Termination;
pub use topology::{ModelSpeakerSelector, SpeakerSelector, TopologyKind};
pub use user_proxy::{InputFn, UserProxyAgent};
pub use validation::validate_arguments;
