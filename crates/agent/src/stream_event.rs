//! Run-level streaming events.
//!
//! A run yields one `Message` event per appended message, in history
//! order, followed by exactly one `Finished` event carrying the
//! [`RunResult`]. The task message is never yielded.

use std::fmt;

use crewloop_core::message::{History, Message};
use crewloop_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted while a run executes.
///
/// - `message`: a message was appended to the history
/// - `finished`: the run stopped; always last
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A message was appended to the shared history.
    Message { message: Message },

    /// The run is complete.
    Finished { result: RunResult },
}

impl RunEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Finished { .. } => "finished",
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// The termination condition was satisfied.
    Condition { reason: String },

    /// The turn ceiling was reached before any condition was met.
    TurnLimit { max_turns: usize },

    /// The caller cancelled the run.
    Cancelled,

    /// An agent kept handing off to a target it did not declare.
    IllegalHandoff { agent: String, target: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition { reason } => f.write_str(reason),
            Self::TurnLimit { max_turns } => {
                write!(f, "Maximum number of turns {max_turns} reached")
            }
            Self::Cancelled => f.write_str("Cancelled"),
            Self::IllegalHandoff { agent, target } => {
                write!(f, "Agent '{agent}' repeated an illegal handoff to '{target}'")
            }
        }
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// The full shared history, including any seeded messages and the task
    pub history: History,

    pub stop_reason: StopReason,

    /// Messages appended during this run (the task excluded)
    pub messages_produced: usize,

    /// Agent turns taken
    pub turns: usize,

    /// Token usage summed over this run's messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl RunResult {
    /// Copy of the history, for seeding the next run of a multi-turn session.
    pub fn history_snapshot(&self) -> History {
        self.history.clone()
    }

    /// Messages produced by this run.
    pub fn run_messages(&self) -> &[Message] {
        let messages = self.history.messages();
        &messages[messages.len() - self.messages_produced.min(messages.len())..]
    }

    /// Content of the last message produced by this run.
    pub fn final_content(&self) -> Option<&str> {
        self.run_messages().last().map(|m| m.content.as_str())
    }
}

/// Sum the usage reported on `messages`.
pub(crate) fn total_usage(messages: &[Message]) -> Option<Usage> {
    messages
        .iter()
        .filter_map(|m| m.usage.as_ref())
        .fold(None, |acc: Option<Usage>, u| {
            let mut total = acc.unwrap_or(Usage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
            });
            total.prompt_tokens += u.prompt_tokens;
            total.completion_tokens += u.completion_tokens;
            total.total_tokens += u.total_tokens;
            Some(total)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stop_reason: StopReason) -> RunResult {
        RunResult {
            history: History::from_messages(vec![
                Message::user("Write a poem"),
                Message::text("primary", "Roses are red"),
                Message::text("critic", "TERMINATE"),
            ]),
            stop_reason,
            messages_produced: 2,
            turns: 2,
            usage: None,
        }
    }

    #[test]
    fn event_serialization_message() {
        let event = RunEvent::Message {
            message: Message::text("primary", "Hello"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"message""#));
        assert!(json.contains(r#""source":"primary""#));
        assert!(json.contains(r#""kind":"text""#));
    }

    #[test]
    fn event_serialization_finished() {
        let event = RunEvent::Finished {
            result: result(StopReason::TurnLimit { max_turns: 10 }),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"finished""#));
        assert!(json.contains(r#""stop_reason":{"kind":"turn_limit","max_turns":10}"#));
        assert!(!json.contains("usage"));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            RunEvent::Message {
                message: Message::user("x")
            }
            .event_type(),
            "message"
        );
        assert_eq!(
            RunEvent::Finished {
                result: result(StopReason::Cancelled)
            }
            .event_type(),
            "finished"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = serde_json::to_string(&RunEvent::Finished {
            result: result(StopReason::Condition {
                reason: "Text 'TERMINATE' mentioned".into(),
            }),
        })
        .unwrap();
        let event: RunEvent = serde_json::from_str(&json).unwrap();
        let RunEvent::Finished { result } = event else {
            panic!("expected finished event");
        };
        assert_eq!(result.history.len(), 3);
        assert_eq!(result.stop_reason.to_string(), "Text 'TERMINATE' mentioned");
    }

    #[test]
    fn run_messages_exclude_task() {
        let r = result(StopReason::Cancelled);
        assert_eq!(r.run_messages().len(), 2);
        assert_eq!(r.final_content(), Some("TERMINATE"));
        assert_eq!(r.history_snapshot().len(), 3);
    }

    #[test]
    fn stop_reason_display() {
        assert_eq!(
            StopReason::TurnLimit { max_turns: 5 }.to_string(),
            "Maximum number of turns 5 reached"
        );
        assert_eq!(StopReason::Cancelled.to_string(), "Cancelled");
        assert_eq!(
            StopReason::IllegalHandoff {
                agent: "planner".into(),
                target: "hotels".into()
            }
            .to_string(),
            "Agent 'planner' repeated an illegal handoff to 'hotels'"
        );
    }

    #[test]
    fn usage_sums_reported_messages() {
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let messages = vec![
            Message::text("a", "1").with_usage(Some(usage.clone())),
            Message::tool_call_result("a", vec![]),
            Message::text("b", "2").with_usage(Some(usage)),
        ];
        assert_eq!(total_usage(&messages).unwrap().total_tokens, 30);
        assert!(total_usage(&messages[1..2]).is_none());
    }
}
