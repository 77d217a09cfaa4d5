//! `crewloop run`: stream a team run to the console.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crewloop_agent::{InputFn, RunEvent, RunRequest, RunResult, StopReason, TeamBuilder};
use crewloop_config::{AppConfig, TeamConfig};
use crewloop_core::message::{History, Message, MessageKind};
use futures::StreamExt;

pub struct RunArgs {
    pub team: PathBuf,
    pub task: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub json: bool,
    pub interactive: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    super::require_api_key(&config)?;
    let team_config = TeamConfig::load_from(&args.team)?;

    let provider = super::build_provider(&config)?;
    let mut builder = TeamBuilder::new(config, provider).with_input(console_input());
    if let Some(dir) = &args.output_dir {
        builder = builder.with_output_dir(dir);
    }
    let team = builder.build(&team_config).await?;

    let mut task = match args.task {
        Some(task) => task,
        None => read_line("  Task > ").await?,
    };
    let mut history = History::new();

    loop {
        let mut stream = team.submit(RunRequest::new(task).seeded(history));
        let on_signal = stream.cancel_token();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n  Cancelling after the current step...");
                on_signal.cancel();
            }
        });

        let mut finished = None;
        while let Some(event) = stream.next().await {
            if args.json {
                println!("{}", serde_json::to_string(&event)?);
            }
            match event {
                RunEvent::Message { message } => {
                    if !args.json {
                        println!("{}", render_message(&message));
                    }
                }
                RunEvent::Finished { result } => {
                    if !args.json {
                        println!("{}", render_summary(&result));
                    }
                    finished = Some(result);
                }
            }
        }
        watcher.abort();

        let Some(result) = finished else { break };
        if !args.interactive || result.stop_reason == StopReason::Cancelled {
            break;
        }
        task = read_line("  Next task (empty to quit) > ").await?;
        if task.is_empty() {
            break;
        }
        history = result.history;
    }

    Ok(())
}

/// One line (or block) per message, the way a chat console shows it.
pub fn render_message(message: &Message) -> String {
    match message.kind {
        MessageKind::Text => format!("---------- {} ----------\n{}", message.source, message.content),
        MessageKind::ToolCallRequest => message
            .tool_calls
            .iter()
            .map(|c| format!("  [{}] -> {}({})", message.source, c.name, c.arguments))
            .collect::<Vec<_>>()
            .join("\n"),
        MessageKind::ToolCallResult => message
            .tool_results
            .iter()
            .map(|r| format!("  [{}] <- {}: {}", message.source, r.name, r.output))
            .collect::<Vec<_>>()
            .join("\n"),
        MessageKind::Handoff => format!(
            "  [{}] handed off to {}",
            message.source,
            message.handoff_target.as_deref().unwrap_or("?")
        ),
        MessageKind::BackendError => format!("  [{}] {}", message.source, message.content),
    }
}

pub fn render_summary(result: &RunResult) -> String {
    let tokens = result
        .usage
        .as_ref()
        .map(|u| format!(", {} tokens", u.total_tokens))
        .unwrap_or_default();
    format!(
        "\n  Stopped: {} ({} messages, {} turns{tokens})",
        result.stop_reason, result.messages_produced, result.turns
    )
}

/// Reads replies for user-proxy agents from the terminal.
fn console_input() -> InputFn {
    Arc::new(|prompt| {
        Box::pin(async move {
            if !prompt.is_empty() {
                println!("{prompt}");
            }
            read_line("  You > ").await.map_err(|e| e.to_string())
        })
    })
}

async fn read_line(label: &'static str) -> Result<String, std::io::Error> {
    tokio::task::spawn_blocking(move || {
        print!("{label}");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stdin closed",
            ));
        }
        Ok(line.trim().to_string())
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewloop_core::tool::{ToolCall, ToolResult};

    #[test]
    fn renders_each_kind() {
        assert_eq!(
            render_message(&Message::text("critic", "TERMINATE")),
            "---------- critic ----------\nTERMINATE"
        );

        let request = Message::tool_call_request(
            "analyst",
            "",
            vec![ToolCall::new("c1", "memory_search", serde_json::json!({"query": "units"}))],
        );
        assert_eq!(
            render_message(&request),
            r#"  [analyst] -> memory_search({"query":"units"})"#
        );

        let result = Message::tool_call_result(
            "analyst",
            vec![ToolResult::error("c1", "file_write", "Error: Permission denied")],
        );
        assert_eq!(
            render_message(&result),
            "  [analyst] <- file_write: Error: Permission denied"
        );

        assert_eq!(
            render_message(&Message::handoff("planner", "flights", "over")),
            "  [planner] handed off to flights"
        );
    }

    #[test]
    fn summary_mentions_reason_and_counts() {
        let result = RunResult {
            history: History::new(),
            stop_reason: StopReason::TurnLimit { max_turns: 4 },
            messages_produced: 4,
            turns: 4,
            usage: None,
        };
        let summary = render_summary(&result);
        assert!(summary.contains("Maximum number of turns 4 reached"));
        assert!(summary.contains("4 messages, 4 turns)"));
    }
}
