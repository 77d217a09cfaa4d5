//! Selector: a model picks the next speaker from participant descriptions.
//!
//! The answer must name exactly one candidate. An invalid answer is logged
//! as `TeamError::InvalidSelection` and the selector is asked once more with
//! the error attached; if that fails too, the turn falls back to round-robin
//! order. A failing selector backend falls back immediately.

use std::sync::Arc;

use async_trait::async_trait;
use crewloop_core::agent::Agent;
use crewloop_core::error::{ProviderError, TeamError};
use crewloop_core::message::{Message, MessageKind};
use crewloop_core::provider::{ChatMessage, Provider, ProviderRequest};
use tracing::{debug, warn};

use super::{Topology, last_speaker, rotate};

/// Asks made before falling back to round-robin order.
const MAX_SELECTION_ATTEMPTS: usize = 2;

/// Default selector prompt. Placeholders: `{roles}`, `{participants}`,
/// `{history}`.
pub const DEFAULT_SELECTOR_PROMPT: &str = "You are coordinating a team. The following roles are available:
{roles}

Read the following conversation, then select the next role from {participants} to speak. Only return the role name.

{history}

Read the above conversation, then select the next role from {participants} to speak. Only return the role name.";

/// A participant eligible to speak next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub description: String,
}

/// Produces a raw speaker choice. The topology validates it.
#[async_trait]
pub trait SpeakerSelector: Send + Sync {
    /// `feedback` carries the previous attempt's error on a re-prompt.
    async fn select(
        &self,
        history: &[Message],
        candidates: &[Candidate],
        feedback: Option<&TeamError>,
    ) -> Result<String, ProviderError>;
}

/// A [`SpeakerSelector`] backed by a language model.
pub struct ModelSpeakerSelector {
    provider: Arc<dyn Provider>,
    model: String,
    template: String,
}

impl ModelSpeakerSelector {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            template: DEFAULT_SELECTOR_PROMPT.to_string(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Fill the template for one selection.
    pub fn render(
        &self,
        history: &[Message],
        candidates: &[Candidate],
        feedback: Option<&TeamError>,
    ) -> String {
        let roles = candidates
            .iter()
            .map(|c| format!("{}: {}", c.name, c.description))
            .collect::<Vec<_>>()
            .join("\n");
        let names = format!(
            "[{}]",
            candidates
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let transcript = history
            .iter()
            .filter(|m| {
                matches!(
                    m.kind,
                    MessageKind::Text | MessageKind::Handoff | MessageKind::ToolCallResult
                )
            })
            .map(|m| format!("{}: {}", m.source, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = self
            .template
            .replace("{roles}", &roles)
            .replace("{participants}", &names)
            .replace("{history}", &transcript);
        if let Some(error) = feedback {
            prompt.push_str(&format!(
                "\n\nYour previous answer was rejected: {error}. Reply with exactly one name from {names}."
            ));
        }
        prompt
    }
}

#[async_trait]
impl SpeakerSelector for ModelSpeakerSelector {
    async fn select(
        &self,
        history: &[Message],
        candidates: &[Candidate],
        feedback: Option<&TeamError>,
    ) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(self.render(history, candidates, feedback))],
            temperature: 0.0,
            max_tokens: None,
            tools: Vec::new(),
        };
        let response = self.provider.complete(request).await?;
        Ok(response.content)
    }
}

/// Resolve a raw selector answer to a candidate position.
///
/// Accepts an exact name (surrounding quotes and punctuation ignored) or
/// text that mentions exactly one candidate as a whole word.
pub fn parse_selection(raw: &str, candidates: &[Candidate]) -> Result<usize, TeamError> {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.' | '*'));
    if let Some(i) = candidates.iter().position(|c| c.name == trimmed) {
        return Ok(i);
    }

    let mentioned: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| mentions(raw, &c.name))
        .map(|(i, _)| i)
        .collect();
    match mentioned.as_slice() {
        [only] => Ok(*only),
        _ => Err(TeamError::InvalidSelection {
            choice: raw.trim().to_string(),
            candidates: candidates.iter().map(|c| c.name.clone()).collect(),
        }),
    }
}

fn mentions(text: &str, name: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(name).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + name.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Model-driven speaker selection.
pub struct Selector {
    selector: Arc<dyn SpeakerSelector>,
    allow_repeated_speaker: bool,
}

impl Selector {
    pub fn new(selector: Arc<dyn SpeakerSelector>, allow_repeated_speaker: bool) -> Self {
        Self {
            selector,
            allow_repeated_speaker,
        }
    }
}

#[async_trait]
impl Topology for Selector {
    fn name(&self) -> &'static str {
        "selector"
    }

    async fn next_speaker(
        &mut self,
        history: &[Message],
        participants: &[Arc<dyn Agent>],
    ) -> usize {
        let previous = last_speaker(history, participants);
        let eligible: Vec<usize> = (0..participants.len())
            .filter(|i| {
                self.allow_repeated_speaker || participants.len() == 1 || Some(*i) != previous
            })
            .collect();
        if let [only] = eligible.as_slice() {
            return *only;
        }

        let candidates: Vec<Candidate> = eligible
            .iter()
            .map(|&i| Candidate {
                name: participants[i].name().to_string(),
                description: participants[i].description().to_string(),
            })
            .collect();

        let mut feedback = None;
        for attempt in 1..=MAX_SELECTION_ATTEMPTS {
            match self
                .selector
                .select(history, &candidates, feedback.as_ref())
                .await
            {
                Ok(raw) => match parse_selection(&raw, &candidates) {
                    Ok(pos) => {
                        debug!(speaker = %candidates[pos].name, attempt, "Speaker selected");
                        return eligible[pos];
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Invalid speaker selection");
                        feedback = Some(e);
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Speaker selector failed");
                    break;
                }
            }
        }

        let fallback = rotate(history, participants);
        warn!(
            speaker = %participants[fallback].name(),
            "Falling back to round-robin speaker order"
        );
        fallback
    }
}
