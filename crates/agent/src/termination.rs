//! Termination conditions.
//!
//! A condition is a predicate over the messages produced since the current
//! run started (the task itself is excluded). Conditions only look at that
//! slice, so once satisfied they stay satisfied as more messages arrive.
//!
//! Compose with `|` (either) and `&` (both):
//!
//! ```
//! use crewloop_agent::Termination;
//! let stop = Termination::text_mention("TERMINATE") | Termination::max_messages(10);
//! ```

use std::ops::{BitAnd, BitOr};

use crewloop_config::TerminationConfig;
use crewloop_core::message::{Message, MessageKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Some message contains `text` (exact, case-sensitive substring)
    TextMention { text: String, sources: Vec<String> },
    /// The run produced at least this many messages
    MaxMessages(usize),
    /// `source` produced a plain text reply
    TextMessage { source: String },
    /// Any child is satisfied
    Any(Vec<Termination>),
    /// Every child is satisfied
    All(Vec<Termination>),
}

impl Termination {
    pub fn text_mention(text: impl Into<String>) -> Self {
        Self::TextMention {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    /// Only count mentions from these sources.
    pub fn from_sources(self, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        match self {
            Self::TextMention { text, .. } => Self::TextMention {
                text,
                sources: sources.into_iter().map(Into::into).collect(),
            },
            other => other,
        }
    }

    pub fn max_messages(max: usize) -> Self {
        Self::MaxMessages(max)
    }

    pub fn text_message(source: impl Into<String>) -> Self {
        Self::TextMessage {
            source: source.into(),
        }
    }

    /// Build a condition tree from its declarative form.
    pub fn from_config(config: &TerminationConfig) -> Self {
        match config {
            TerminationConfig::TextMention { text, sources } => Self::TextMention {
                text: text.clone(),
                sources: sources.clone(),
            },
            TerminationConfig::MaxMessages { max_messages } => Self::MaxMessages(*max_messages),
            TerminationConfig::TextMessage { source } => Self::text_message(source),
            TerminationConfig::Any { conditions } => {
                Self::Any(conditions.iter().map(Self::from_config).collect())
            }
            TerminationConfig::All { conditions } => {
                Self::All(conditions.iter().map(Self::from_config).collect())
            }
        }
    }

    /// Evaluate against the messages of the current run. Returns the stop
    /// reason when satisfied.
    pub fn check(&self, run: &[Message]) -> Option<String> {
        match self {
            Self::TextMention { text, sources } => run
                .iter()
                .any(|m| {
                    matches!(m.kind, MessageKind::Text | MessageKind::Handoff)
                        && (sources.is_empty() || sources.contains(&m.source))
                        && m.content.contains(text.as_str())
                })
                .then(|| format!("Text '{text}' mentioned")),
            Self::MaxMessages(max) => (run.len() >= *max).then(|| {
                format!(
                    "Maximum number of messages {max} reached, current message count: {}",
                    run.len()
                )
            }),
            Self::TextMessage { source } => run
                .iter()
                .any(|m| m.is_text() && &m.source == source)
                .then(|| format!("Text message received from '{source}'")),
            Self::Any(conditions) => conditions.iter().find_map(|c| c.check(run)),
            Self::All(conditions) => {
                if conditions.is_empty() {
                    return None;
                }
                let reasons = conditions
                    .iter()
                    .map(|c| c.check(run))
                    .collect::<Option<Vec<_>>>()?;
                Some(reasons.join("; "))
            }
        }
    }

    pub fn is_satisfied(&self, run: &[Message]) -> bool {
        self.check(run).is_some()
    }
}

impl BitOr for Termination {
    type Output = Termination;

    fn bitor(self, rhs: Self) -> Self::Output {
        match self {
            Self::Any(mut conditions) => {
                conditions.push(rhs);
                Self::Any(conditions)
            }
            lhs => Self::Any(vec![lhs, rhs]),
        }
    }
}

impl BitAnd for Termination {
    type Output = Termination;

    fn bitand(self, rhs: Self) -> Self::Output {
        match self {
            Self::All(mut conditions) => {
                conditions.push(rhs);
                Self::All(conditions)
            }
            lhs => Self::All(vec![lhs, rhs]),
        }
    }
}
