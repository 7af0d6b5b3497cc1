use std::sync::Arc;

use anyhow::{anyhow, Result};
use boardroom_schema::{ConversationLog, ConversationMessage, GeneratedMessage};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::conversation::{
    Conversation, ConversationError, ConversationState, GenerationOutcome,
};
use crate::generator::{GenerateError, MessageSource};

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum Command {
    Start {
        topic: String,
        custom_topic: Option<String>,
    },
    Pause,
    Resume {
        input: Option<String>,
    },
    Retry,
    Stop,
    ViewLog {
        id: String,
    },
    CloseLog,
    ListLogs {
        reply: oneshot::Sender<Vec<ConversationLog>>,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    StateChanged(ConversationState),
    MessageAppended(ConversationMessage),
    GenerationFailed(GenerateError),
    LogArchived(ConversationLog),
    LogOpened(ConversationLog),
    Rejected(ConversationError),
}

/// Sends commands to a running conversation task and subscribes to its
/// events.
#[derive(Clone)]
pub struct ConversationHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ConversationEvent>,
}

impl ConversationHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("conversation task has stopped"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub async fn list_logs(&self) -> Result<Vec<ConversationLog>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ListLogs { reply }).await?;
        rx.await
            .map_err(|_| anyhow!("conversation task dropped the reply"))
    }
}

/// Spawns the task that owns `conversation`. It issues a generation whenever
/// the conversation is playing with nothing in flight, and returns the
/// conversation once shut down.
pub fn spawn(
    conversation: Conversation,
    source: Arc<dyn MessageSource>,
) -> (ConversationHandle, JoinHandle<Conversation>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let handle = ConversationHandle {
        commands: commands_tx,
        events: events_tx.clone(),
    };
    let task = tokio::spawn(run(conversation, source, commands_rx, events_tx));
    (handle, task)
}

type Completion = (u64, Result<GeneratedMessage, GenerateError>);

async fn run(
    mut conversation: Conversation,
    source: Arc<dyn MessageSource>,
    mut commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<ConversationEvent>,
) -> Conversation {
    let (done_tx, mut done_rx) = mpsc::channel::<Completion>(1);

    loop {
        if let Some(ticket) = conversation.begin_generation() {
            let source = source.clone();
            let done_tx = done_tx.clone();
            let call = tokio::spawn(async move { source.next_message(ticket.request).await });
            // The in-flight slot is only released by a completion, so a call
            // that panics or is cancelled still reports back as a failure.
            tokio::spawn(async move {
                let result = call.await.unwrap_or_else(|join_err| {
                    tracing::error!(error = %join_err, "generation task did not finish");
                    Err(GenerateError::new(join_err.to_string()))
                });
                let _ = done_tx.send((ticket.session, result)).await;
            });
        }

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                if matches!(command, Command::Shutdown) {
                    break;
                }
                apply(&mut conversation, command, &events);
            }
            Some((session, result)) = done_rx.recv() => {
                match conversation.complete_generation(session, result) {
                    GenerationOutcome::Appended(msg) => {
                        emit(&events, ConversationEvent::MessageAppended(msg));
                    }
                    GenerationOutcome::Failed(err) => {
                        emit(&events, ConversationEvent::GenerationFailed(err));
                    }
                    GenerationOutcome::Discarded => {}
                }
            }
        }
    }

    tracing::debug!("conversation task stopped");
    conversation
}

fn apply(
    conversation: &mut Conversation,
    command: Command,
    events: &broadcast::Sender<ConversationEvent>,
) {
    let before = conversation.state();

    let result = match command {
        Command::Start {
            topic,
            custom_topic,
        } => conversation.start(&topic, custom_topic),
        Command::Pause => conversation.pause(),
        Command::Resume { input } => conversation.resume(input.as_deref()).map(|injected| {
            if let Some(msg) = injected {
                emit(events, ConversationEvent::MessageAppended(msg));
            }
        }),
        Command::Retry => conversation.retry(),
        Command::Stop => conversation.stop().map(|archived| {
            if let Some(log) = archived {
                emit(events, ConversationEvent::LogArchived(log));
            }
        }),
        Command::ViewLog { id } => conversation.view_log(&id).map(|archived| {
            if let Some(log) = archived {
                emit(events, ConversationEvent::LogArchived(log));
            }
            if let Some(log) = conversation.viewing() {
                emit(events, ConversationEvent::LogOpened(log.clone()));
            }
        }),
        Command::CloseLog => conversation.close_log(),
        Command::ListLogs { reply } => {
            let _ = reply.send(conversation.logs().list().to_vec());
            Ok(())
        }
        Command::Shutdown => Ok(()),
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "conversation command rejected");
        emit(events, ConversationEvent::Rejected(err));
        return;
    }

    let after = conversation.state();
    if before != after {
        emit(events, ConversationEvent::StateChanged(after));
    }
}

fn emit(events: &broadcast::Sender<ConversationEvent>, event: ConversationEvent) {
    let _ = events.send(event);
}
