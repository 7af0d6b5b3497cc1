use std::sync::Arc;

use anyhow::Result;
use boardroom_core::{
    spawn, Command, Conversation, ConversationEvent, LogStore, MessageSource,
};
use boardroom_schema::{ConversationLog, ConversationMessage};
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

pub struct PlayOptions {
    pub topic: String,
    pub custom_topic: Option<String>,
    pub default_topic: String,
    pub logs: LogStore,
    pub source: Arc<dyn MessageSource>,
}

#[derive(Debug)]
enum LineCommand {
    Send(Command),
    Logs,
    Help,
    Quit,
}

const HELP: &str = "Commands:
  start [topic] [custom text]  begin a new discussion
  pause                        pause after the current message
  resume [text]                resume, optionally adding your own input
  retry                        retry after a failed message
  stop                         end and archive the discussion
  logs                         list archived discussions
  view <id>                    open an archived discussion
  close                        close the open discussion
  quit                         leave (archives a live discussion)";

pub async fn run_play(options: PlayOptions) -> Result<()> {
    let conversation = Conversation::new(options.logs, options.default_topic);
    let (handle, task) = spawn(conversation, options.source);

    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{}", style("Boardroom is open.").bold().cyan());
    println!("{HELP}");
    println!("---");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line, &options.topic, options.custom_topic.as_deref()) {
            Ok(None) => continue,
            Ok(Some(LineCommand::Quit)) => break,
            Ok(Some(LineCommand::Help)) => println!("{HELP}"),
            Ok(Some(LineCommand::Logs)) => print_log_list(&handle.list_logs().await?),
            Ok(Some(LineCommand::Send(command))) => handle.send(command).await?,
            Err(usage) => eprintln!("{}", style(usage).yellow()),
        }
    }

    handle.send(Command::Shutdown).await?;
    let mut conversation = task.await?;
    printer.abort();

    if conversation.state().is_live() {
        if let Ok(Some(log)) = conversation.stop() {
            println!(
                "{}",
                style(format!("Archived {} ({} messages)", log.title, log.messages.len())).green()
            );
        }
    }

    Ok(())
}

fn parse_line(
    line: &str,
    default_topic: &str,
    default_custom: Option<&str>,
) -> Result<Option<LineCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "start" => {
            let (topic, custom) = match rest.split_once(char::is_whitespace) {
                Some((topic, custom)) => (topic.to_string(), Some(custom.trim().to_string())),
                None if rest.is_empty() => (
                    default_topic.to_string(),
                    default_custom.map(str::to_string),
                ),
                None => (rest.to_string(), None),
            };
            LineCommand::Send(Command::Start {
                topic,
                custom_topic: custom,
            })
        }
        "pause" => LineCommand::Send(Command::Pause),
        "resume" => LineCommand::Send(Command::Resume {
            input: (!rest.is_empty()).then(|| rest.to_string()),
        }),
        "retry" => LineCommand::Send(Command::Retry),
        "stop" => LineCommand::Send(Command::Stop),
        "logs" => LineCommand::Logs,
        "view" => {
            if rest.is_empty() {
                return Err("usage: view <log id>".to_string());
            }
            LineCommand::Send(Command::ViewLog {
                id: rest.to_string(),
            })
        }
        "close" => LineCommand::Send(Command::CloseLog),
        "help" => LineCommand::Help,
        "quit" | "exit" => LineCommand::Quit,
        other => return Err(format!("unknown command: {other} (type `help`)")),
    };
    Ok(Some(command))
}

fn print_event(event: &ConversationEvent) {
    match event {
        ConversationEvent::StateChanged(state) => {
            println!("{}", style(format!("-- {state} --")).dim());
        }
        ConversationEvent::MessageAppended(msg) => print_message(msg),
        ConversationEvent::GenerationFailed(err) => {
            println!(
                "{}",
                style(format!("{err}. Type `retry` to try again.")).red()
            );
        }
        ConversationEvent::LogArchived(log) => {
            println!(
                "{}",
                style(format!(
                    "Archived {} ({} messages) id={}",
                    log.title,
                    log.messages.len(),
                    log.id
                ))
                .green()
            );
        }
        ConversationEvent::LogOpened(log) => print_log(log),
        ConversationEvent::Rejected(err) => println!("{}", style(err).yellow()),
    }
}

fn print_message(msg: &ConversationMessage) {
    let time = msg.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S");
    let name = if msg.is_user() {
        style(&msg.agent_name).yellow().bold()
    } else {
        style(&msg.agent_name).cyan().bold()
    };
    println!("[{time}] {name}: {}", msg.content);
}

pub fn print_log(log: &ConversationLog) {
    println!("{}", style(&log.title).bold());
    for msg in &log.messages {
        print_message(msg);
    }
}

fn print_log_list(logs: &[ConversationLog]) {
    if logs.is_empty() {
        println!("No conversation logs.");
        return;
    }
    for log in logs {
        println!(
            "{}  {}  ({} messages)  {}",
            log.id,
            log.title,
            log.messages.len(),
            log.preview()
        );
    }
}
