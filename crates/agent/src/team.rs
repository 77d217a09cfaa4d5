//! Team: the turn-taking run loop.
//!
//! A run appends the task to the shared history, then repeats one step
//! until something stops it:
//!
//! ```text
//! cancelled? ─▶ turn ceiling? ─▶ pick speaker ─▶ act ─▶ append + yield ─▶ stop?
//!                                                  │
//!                                   tool request? ─┴▶ dispatch ─▶ append + yield ─▶ stop?
//! ```
//!
//! The termination condition sees only the messages produced by the current
//! run and is checked after every append. Cancellation is observed between
//! steps; an agent call or tool dispatch in flight always completes.
//!
//! A handoff to a target the speaker did not declare is answered with an
//! `Error: ...` result in the speaker's name, so its next prompt carries the
//! rejection. A second rejection in a row stops the run.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crewloop_core::agent::Agent;
use crewloop_core::error::{Error, TeamError};
use crewloop_core::message::{History, Message, MessageKind, USER_SOURCE};
use crewloop_core::tool::ToolResult;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assistant::HANDOFF_TOOL_PREFIX;
use crate::dispatcher::ToolDispatcher;
use crate::stream_event::{RunEvent, RunResult, StopReason, total_usage};
use crate::termination::Termination;
use crate::topology::{TopologyKind, resolve_handoff};

/// Turn ceiling applied when none is configured.
pub const DEFAULT_MAX_TURNS: usize = 100;

/// Consecutive illegal handoffs from one agent before the run stops.
pub const MAX_REJECTED_HANDOFFS: usize = 2;

/// An ordered set of participants plus the rules for running them.
pub struct Team {
    participants: Vec<Arc<dyn Agent>>,
    topology: TopologyKind,
    termination: Option<Termination>,
    max_turns: usize,
    dispatcher: ToolDispatcher,
}

impl Team {
    /// Build a team. Fails when there are no participants, when two share a
    /// name, when one uses the task author's name, or when a declared
    /// handoff target is not a participant.
    pub fn new(participants: Vec<Arc<dyn Agent>>, topology: TopologyKind) -> Result<Self, TeamError> {
        if participants.is_empty() {
            return Err(TeamError::EmptyTeam);
        }

        let mut names = HashSet::new();
        for agent in &participants {
            if agent.name() == USER_SOURCE {
                return Err(TeamError::ReservedName(USER_SOURCE.to_string()));
            }
            if !names.insert(agent.name()) {
                return Err(TeamError::DuplicateParticipant(agent.name().to_string()));
            }
        }
        for agent in &participants {
            if let Some(target) = agent
                .handoffs()
                .iter()
                .find(|t| !names.contains(t.as_str()))
            {
                return Err(TeamError::UnknownHandoffTarget {
                    agent: agent.name().to_string(),
                    target: target.clone(),
                });
            }
        }

        Ok(Self {
            participants,
            topology,
            termination: None,
            max_turns: DEFAULT_MAX_TURNS,
            dispatcher: ToolDispatcher::new(),
        })
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = Some(termination);
        self
    }

    /// Hard ceiling on agent turns per run. Values below 1 are raised to 1.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: ToolDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn participants(&self) -> &[Arc<dyn Agent>] {
        &self.participants
    }

    pub fn topology(&self) -> &TopologyKind {
        &self.topology
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Start a run. Nothing happens until the stream is polled; dropping the
    /// stream abandons the run.
    pub fn submit(&self, request: RunRequest) -> RunStream {
        let participants = self.participants.clone();
        let mut topology = self.topology.instantiate();
        let termination = self.termination.clone();
        let max_turns = self.max_turns;
        let dispatcher = self.dispatcher.clone();
        let RunRequest {
            task,
            history: seed,
            cancel,
        } = request;
        let token = cancel.clone();

        let events = async_stream::stream! {
            let mut history = seed;
            if let Some(task) = task {
                history.push(task);
            }
            let run_start = history.len();
            let mut turns = 0usize;
            let mut reflect_next: Option<usize> = None;
            let mut rejected = vec![0usize; participants.len()];

            info!(
                topology = topology.name(),
                participants = participants.len(),
                seeded = run_start,
                max_turns,
                "Run started"
            );

            let stop_reason = loop {
                if token.is_cancelled() {
                    break StopReason::Cancelled;
                }
                if turns >= max_turns {
                    break StopReason::TurnLimit { max_turns };
                }

                let speaker = match reflect_next.take() {
                    Some(i) => i,
                    None => topology.next_speaker(history.messages(), &participants).await,
                };
                let agent = participants[speaker].clone();
                turns += 1;
                debug!(turn = turns, agent = %agent.name(), "Agent turn");

                let message = agent.act(history.messages()).await;
                let requested_tools = message.kind == MessageKind::ToolCallRequest;
                history.push(message.clone());
                yield RunEvent::Message { message: message.clone() };
                if let Some(reason) = stop_condition(termination.as_ref(), history.since(run_start)) {
                    break StopReason::Condition { reason };
                }

                if message.kind == MessageKind::Handoff
                    && let Some(target) = message.handoff_target.as_deref()
                    && let Err(e) = resolve_handoff(&participants, agent.name(), target)
                {
                    rejected[speaker] += 1;
                    warn!(
                        agent = %agent.name(),
                        to = %target,
                        attempt = rejected[speaker],
                        "Handoff rejected"
                    );
                    let feedback = handoff_rejection(agent.as_ref(), &message, target, &e);
                    history.push(feedback.clone());
                    yield RunEvent::Message { message: feedback };
                    if let Some(reason) = stop_condition(termination.as_ref(), history.since(run_start)) {
                        break StopReason::Condition { reason };
                    }
                    if rejected[speaker] >= MAX_REJECTED_HANDOFFS {
                        break StopReason::IllegalHandoff {
                            agent: agent.name().to_string(),
                            target: target.to_string(),
                        };
                    }
                    continue;
                }
                rejected[speaker] = 0;

                if requested_tools {
                    let result = dispatcher.execute(agent.name(), agent.tools(), &message).await;
                    history.push(result.clone());
                    yield RunEvent::Message { message: result };
                    if let Some(reason) = stop_condition(termination.as_ref(), history.since(run_start)) {
                        break StopReason::Condition { reason };
                    }
                    if agent.reflects_on_tool_use() {
                        reflect_next = Some(speaker);
                    }
                }
            };

            let messages_produced = history.len() - run_start;
            info!(
                stop_reason = %stop_reason,
                turns,
                messages = messages_produced,
                "Run finished"
            );
            let usage = total_usage(history.since(run_start));
            yield RunEvent::Finished {
                result: RunResult {
                    history,
                    stop_reason,
                    messages_produced,
                    turns,
                    usage,
                },
            };
        };

        RunStream {
            inner: Box::pin(events),
            cancel,
        }
    }

    /// Drive a run to completion and return its result.
    pub async fn run(&self, request: RunRequest) -> Result<RunResult, Error> {
        let mut stream = self.submit(request);
        while let Some(event) = stream.next().await {
            if let RunEvent::Finished { result } = event {
                return Ok(result);
            }
        }
        Err(Error::Internal("run ended without a result".into()))
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field(
                "participants",
                &self.participants.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("topology", &self.topology)
            .field("termination", &self.termination)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

/// The `Error: ...` result that answers an illegal handoff.
fn handoff_rejection(agent: &dyn Agent, request: &Message, target: &str, error: &TeamError) -> Message {
    let allowed = if agent.handoffs().is_empty() {
        "none".to_string()
    } else {
        agent.handoffs().join(", ")
    };
    Message::tool_call_result(
        agent.name(),
        vec![ToolResult::error(
            &request.id,
            format!("{HANDOFF_TOOL_PREFIX}{target}"),
            format!("Error: {error}. Allowed handoff targets: {allowed}."),
        )],
    )
}

fn stop_condition(termination: Option<&Termination>, run: &[Message]) -> Option<String> {
    termination?.check(run)
}

/// What to run: an optional new task on top of an optional seeded history.
#[derive(Debug, Clone)]
pub struct RunRequest {
    task: Option<Message>,
    history: History,
    cancel: CancellationToken,
}

impl RunRequest {
    /// A fresh run on a user task.
    pub fn new(task: impl Into<String>) -> Self {
        Self::from_message(Message::user(task))
    }

    pub fn from_message(task: Message) -> Self {
        Self {
            task: Some(task),
            history: History::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Continue a previous session without a new task.
    pub fn resume(history: History) -> Self {
        Self {
            task: None,
            history,
            cancel: CancellationToken::new(),
        }
    }

    /// Put previously recorded messages before the task.
    pub fn seeded(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Use an existing token, e.g. one shared with a signal handler.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Lazy stream of [`RunEvent`]s. The last event is always `Finished`.
pub struct RunStream {
    inner: BoxStream<'static, RunEvent>,
    cancel: CancellationToken,
}

impl RunStream {
    /// Stop the run at the next step boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for RunStream {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssistantAgent;
    use crate::test_helpers::{
        Reply, ScriptedAgent, SequentialMockProvider, make_text_response, make_tool_call,
        make_tool_call_response,
    };
    use crewloop_core::provider::Role;
    use crewloop_core::tool::{FnTool, ToolRegistry};
    use serde_json::json;

    fn agents(names: &[&str]) -> Vec<Arc<dyn Agent>> {
        names
            .iter()
            .map(|n| Arc::new(ScriptedAgent::always(n, &format!("{n} speaking"))) as Arc<dyn Agent>)
            .collect()
    }

    fn sources(result: &RunResult) -> Vec<&str> {
        result.run_messages().iter().map(|m| m.source.as_str()).collect()
    }

    fn lookup_tools() -> ToolRegistry {
        ToolRegistry::new().with_tool(FnTool::new(
            "lookup",
            "Look up a fact",
            json!({ "type": "object" }),
            |_| Box::pin(async { Ok("42".to_string()) }),
        ))
    }

    async fn collect(stream: RunStream) -> Vec<RunEvent> {
        stream.collect().await
    }

    #[test]
    fn construction_errors() {
        assert_eq!(
            Team::new(vec![], TopologyKind::RoundRobin).unwrap_err(),
            TeamError::EmptyTeam
        );
        assert_eq!(
            Team::new(agents(&["a", "a"]), TopologyKind::RoundRobin).unwrap_err(),
            TeamError::DuplicateParticipant("a".into())
        );
        assert_eq!(
            Team::new(agents(&["user"]), TopologyKind::RoundRobin).unwrap_err(),
            TeamError::ReservedName("user".into())
        );

        let planner: Arc<dyn Agent> =
            Arc::new(ScriptedAgent::always("planner", "x").with_handoffs(["hotels"]));
        assert_eq!(
            Team::new(vec![planner], TopologyKind::Swarm).unwrap_err(),
            TeamError::UnknownHandoffTarget {
                agent: "planner".into(),
                target: "hotels".into()
            }
        );
    }

    #[tokio::test]
    async fn round_robin_until_message_count() {
        let team = Team::new(agents(&["a", "b", "c"]), TopologyKind::RoundRobin)
            .unwrap()
            .with_termination(Termination::max_messages(5));

        let result = team.run(RunRequest::new("go")).await.unwrap();
        assert_eq!(sources(&result), vec!["a", "b", "c", "a", "b"]);
        assert_eq!(result.history.len(), 6);
        assert_eq!(result.messages_produced, 5);
        assert_eq!(result.turns, 5);
        assert!(matches!(result.stop_reason, StopReason::Condition { .. }));
    }

    #[tokio::test]
    async fn task_is_appended_but_not_yielded() {
        let team = Team::new(agents(&["a"]), TopologyKind::RoundRobin)
            .unwrap()
            .with_termination(Termination::max_messages(1));

        let events = collect(team.submit(RunRequest::new("the task"))).await;
        assert_eq!(events.len(), 2);
        let RunEvent::Message { message } = &events[0] else {
            panic!("expected message event");
        };
        assert_eq!(message.source, "a");
        let RunEvent::Finished { result } = &events[1] else {
            panic!("expected finished event");
        };
        assert_eq!(result.history.messages()[0].content, "the task");
    }

    #[tokio::test]
    async fn turn_ceiling_without_condition() {
        let team = Team::new(agents(&["a", "b"]), TopologyKind::RoundRobin)
            .unwrap()
            .with_max_turns(3);

        let result = team.run(RunRequest::new("go")).await.unwrap();
        assert_eq!(result.stop_reason, StopReason::TurnLimit { max_turns: 3 });
        assert_eq!(sources(&result), vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn tool_step_appends_request_and_result() {
        let analyst: Arc<dyn Agent> = Arc::new(
            ScriptedAgent::new(
                "analyst",
                vec![
                    Reply::ToolCalls(vec![make_tool_call("lookup", json!({}))]),
                    Reply::Text("The answer is 42".into()),
                ],
            )
            .with_tools(lookup_tools())
            .reflecting(),
        );
        let team = Team::new(vec![analyst, agents(&["critic"]).remove(0)], TopologyKind::RoundRobin)
            .unwrap()
            .with_termination(Termination::max_messages(4));

        let result = team.run(RunRequest::new("What is the answer?")).await.unwrap();
        let kinds: Vec<_> = result.run_messages().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::ToolCallRequest,
                MessageKind::ToolCallResult,
                MessageKind::Text,
                MessageKind::Text,
            ]
        );
        // The reflecting analyst speaks again before the critic.
        assert_eq!(sources(&result), vec!["analyst", "analyst", "analyst", "critic"]);
        assert_eq!(result.run_messages()[1].tool_results[0].output, "42");
        assert_eq!(result.turns, 3);
    }

    #[tokio::test]
    async fn termination_checked_before_dispatch() {
        let analyst: Arc<dyn Agent> = Arc::new(
            ScriptedAgent::new(
                "analyst",
                vec![Reply::ToolCalls(vec![make_tool_call("lookup", json!({}))])],
            )
            .with_tools(lookup_tools()),
        );
        let team = Team::new(vec![analyst], TopologyKind::RoundRobin)
            .unwrap()
            .with_termination(Termination::max_messages(1));

        let result = team.run(RunRequest::new("go")).await.unwrap();
        assert_eq!(result.messages_produced, 1);
        assert_eq!(result.run_messages()[0].kind, MessageKind::ToolCallRequest);
    }

    #[tokio::test]
    async fn cancelled_before_start_yields_no_messages() {
        let team = Team::new(agents(&["a"]), TopologyKind::RoundRobin).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let events = collect(team.submit(RunRequest::new("go").with_cancellation(token))).await;
        assert_eq!(events.len(), 1);
        let RunEvent::Finished { result } = &events[0] else {
            panic!("expected finished event");
        };
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert_eq!(result.messages_produced, 0);
        assert_eq!(result.history.len(), 1);
    }

    #[tokio::test]
    async fn cancel_mid_run_stops_at_step_boundary() {
        let team = Team::new(agents(&["a", "b"]), TopologyKind::RoundRobin).unwrap();
        let mut stream = team.submit(RunRequest::new("go"));

        let first = stream.next().await.unwrap();
        assert_eq!(first.event_type(), "message");
        stream.cancel();

        let RunEvent::Finished { result } = stream.next().await.unwrap() else {
            panic!("expected finished event");
        };
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert_eq!(result.messages_produced, 1);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn seeded_run_only_counts_new_messages() {
        let team = Team::new(agents(&["a", "b", "c"]), TopologyKind::RoundRobin)
            .unwrap()
            .with_termination(Termination::max_messages(2) | Termination::text_mention("a speaking"));

        let first = team.run(RunRequest::new("first")).await.unwrap();
        assert_eq!(sources(&first), vec!["a"]);

        // "a speaking" is in the seed but not in the new run's view.
        let team = Team::new(agents(&["a", "b", "c"]), TopologyKind::RoundRobin)
            .unwrap()
            .with_termination(Termination::max_messages(2));
        let second = team
            .run(RunRequest::new("second").seeded(first.history_snapshot()))
            .await
            .unwrap();
        assert_eq!(sources(&second), vec!["b", "c"]);
        assert_eq!(second.history.len(), 5);
    }

    #[tokio::test]
    async fn agents_see_the_whole_history() {
        let a = Arc::new(ScriptedAgent::always("a", "x"));
        let b = Arc::new(ScriptedAgent::always("b", "y"));
        let team = Team::new(
            vec![a.clone() as Arc<dyn Agent>, b.clone() as Arc<dyn Agent>],
            TopologyKind::RoundRobin,
        )
            .unwrap()
            .with_max_turns(4);

        team.run(RunRequest::new("go")).await.unwrap();
        assert_eq!(a.seen(), vec![1, 3]);
        assert_eq!(b.seen(), vec![2, 4]);
    }

    #[tokio::test]
    async fn swarm_follows_handoffs() {
        let planner: Arc<dyn Agent> = Arc::new(
            ScriptedAgent::new("planner", vec![Reply::Handoff("flights".into())])
                .with_handoffs(["flights"]),
        );
        let flights: Arc<dyn Agent> = Arc::new(ScriptedAgent::always("flights", "Booked. TERMINATE"));
        let team = Team::new(vec![planner, flights], TopologyKind::Swarm)
            .unwrap()
            .with_termination(Termination::text_mention("TERMINATE"));

        let result = team.run(RunRequest::new("Book a flight")).await.unwrap();
        assert_eq!(sources(&result), vec!["planner", "flights"]);
        assert_eq!(result.run_messages()[0].kind, MessageKind::Handoff);
    }

    #[tokio::test]
    async fn resume_without_new_task() {
        let team = Team::new(agents(&["a", "b"]), TopologyKind::RoundRobin)
            .unwrap()
            .with_max_turns(1);
        let seed = History::from_messages(vec![Message::user("hi"), Message::text("a", "hello")]);

        let result = team.run(RunRequest::resume(seed)).await.unwrap();
        assert_eq!(sources(&result), vec!["b"]);
        assert_eq!(result.history.len(), 3);
    }

    fn travel_team(planner: Arc<dyn Agent>) -> Team {
        Team::new(
            vec![
                planner,
                Arc::new(ScriptedAgent::always("flights", "Booked")) as Arc<dyn Agent>,
                Arc::new(ScriptedAgent::always("hotels", "Reserved")) as Arc<dyn Agent>,
            ],
            TopologyKind::Swarm,
        )
        .unwrap()
        .with_max_turns(10)
    }

    #[tokio::test]
    async fn illegal_handoff_is_rejected_then_retried() {
        let planner: Arc<dyn Agent> = Arc::new(
            ScriptedAgent::new(
                "planner",
                vec![Reply::Handoff("hotels".into()), Reply::Handoff("flights".into())],
            )
            .with_handoffs(["flights"]),
        );
        let team = travel_team(planner).with_termination(Termination::text_message("flights"));

        let result = team.run(RunRequest::new("Book a trip")).await.unwrap();
        assert_eq!(sources(&result), vec!["planner", "planner", "planner", "flights"]);

        let rejection = &result.run_messages()[1];
        assert_eq!(rejection.kind, MessageKind::ToolCallResult);
        assert!(!rejection.tool_results[0].success);
        assert_eq!(rejection.tool_results[0].name, "transfer_to_hotels");
        assert_eq!(
            rejection.content,
            "Error: Agent 'planner' may not hand off to 'hotels'. Allowed handoff targets: flights."
        );
        assert_eq!(result.turns, 3);
    }

    #[tokio::test]
    async fn repeated_illegal_handoff_stops_the_run() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("transfer_to_hotels", json!({}))], ""),
            make_tool_call_response(vec![make_tool_call("transfer_to_hotels", json!({}))], ""),
            make_text_response("unused"),
        ]));
        let planner: Arc<dyn Agent> = Arc::new(
            AssistantAgent::new("planner", provider.clone(), "gpt-4o-mini").with_handoffs(["flights"]),
        );
        let team = travel_team(planner);

        let result = team.run(RunRequest::new("Book a hotel")).await.unwrap();
        assert_eq!(
            result.stop_reason,
            StopReason::IllegalHandoff {
                agent: "planner".into(),
                target: "hotels".into()
            }
        );
        assert_eq!(result.turns, MAX_REJECTED_HANDOFFS);
        assert_eq!(provider.call_count(), 2);

        // The retry prompt tells the model why its first handoff failed.
        let retry = &provider.requests()[1];
        let last = retry.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.content.contains("may not hand off to 'hotels'"));
        assert!(last.content.contains("Allowed handoff targets: flights"));
    }

    #[tokio::test]
    async fn legal_handoff_resets_the_rejection_count() {
        let planner: Arc<dyn Agent> = Arc::new(
            ScriptedAgent::new(
                "planner",
                vec![Reply::Handoff("hotels".into()), Reply::Text("Let me check".into())],
            )
            .with_handoffs(["flights"]),
        );
        let team = travel_team(planner).with_max_turns(4);

        let result = team.run(RunRequest::new("Book a trip")).await.unwrap();
        // hotels, text, hotels, text: never two rejections in a row.
        assert_eq!(result.stop_reason, StopReason::TurnLimit { max_turns: 4 });
        assert_eq!(result.messages_produced, 6);
    }
}
