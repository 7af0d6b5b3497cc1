use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boardroom_core::{
    spawn, Command, Conversation, ConversationEvent, ConversationState, GenerateError, LogStore,
    MessageSource,
};
use boardroom_schema::{GenerateMessageRequest, GeneratedMessage};
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::timeout;

/// Hands every request to the test and waits for the test to script the reply.
struct ScriptedSource {
    requests: mpsc::UnboundedSender<GenerateMessageRequest>,
    replies: Mutex<mpsc::UnboundedReceiver<Result<GeneratedMessage, GenerateError>>>,
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn next_message(
        &self,
        request: GenerateMessageRequest,
    ) -> Result<GeneratedMessage, GenerateError> {
        let _ = self.requests.send(request);
        let mut replies = self.replies.lock().await;
        replies
            .recv()
            .await
            .unwrap_or_else(|| Err(GenerateError::new("script ended")))
    }
}

struct Harness {
    requests: mpsc::UnboundedReceiver<GenerateMessageRequest>,
    replies: mpsc::UnboundedSender<Result<GeneratedMessage, GenerateError>>,
    events: broadcast::Receiver<ConversationEvent>,
    handle: boardroom_core::ConversationHandle,
}

impl Harness {
    fn start() -> Self {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let source = Arc::new(ScriptedSource {
            requests: req_tx,
            replies: Mutex::new(reply_rx),
        });
        let conversation = Conversation::new(LogStore::in_memory(), "general");
        let (handle, _task) = spawn(conversation, source);
        Self {
            requests: req_rx,
            replies: reply_tx,
            events: handle.subscribe(),
            handle,
        }
    }

    async fn send(&self, command: Command) {
        self.handle.send(command).await.unwrap();
    }

    async fn next_request(&mut self) -> GenerateMessageRequest {
        timeout(Duration::from_secs(2), self.requests.recv())
            .await
            .expect("timed out waiting for a generation request")
            .expect("source dropped")
    }

    async fn assert_no_request(&mut self) {
        let got = timeout(Duration::from_millis(100), self.requests.recv()).await;
        assert!(got.is_err(), "unexpected generation request: {got:?}");
    }

    fn reply(&self, agent_id: &str, agent_name: &str, content: &str) {
        self.replies
            .send(Ok(GeneratedMessage {
                agent_id: agent_id.into(),
                agent_name: agent_name.into(),
                content: content.into(),
                timestamp: Utc::now(),
            }))
            .unwrap();
    }

    fn fail(&self) {
        self.replies
            .send(Err(GenerateError::new("upstream 503")))
            .unwrap();
    }

    async fn wait_for<F>(&mut self, mut matches: F) -> ConversationEvent
    where
        F: FnMut(&ConversationEvent) -> bool,
    {
        loop {
            let event = timeout(Duration::from_secs(2), self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            if matches(&event) {
                return event;
            }
        }
    }

    async fn wait_for_state(&mut self, state: ConversationState) {
        self.wait_for(|e| *e == ConversationEvent::StateChanged(state))
            .await;
    }

    async fn wait_for_message(&mut self) -> boardroom_schema::ConversationMessage {
        match self
            .wait_for(|e| matches!(e, ConversationEvent::MessageAppended(_)))
            .await
        {
            ConversationEvent::MessageAppended(msg) => msg,
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn saas_session_plays_pauses_injects_and_archives() {
    let mut h = Harness::start();

    h.send(Command::Start {
        topic: "saas".into(),
        custom_topic: None,
    })
    .await;
    h.wait_for_state(ConversationState::Playing).await;

    let opening = h.next_request().await;
    assert_eq!(opening.topic, "saas");
    assert!(opening.conversation_history.is_empty());
    assert_eq!(opening.last_speaker, None);

    h.reply("entrepreneur", "Daniel Rodriguez", "Recurring revenue first.");
    let first = h.wait_for_message().await;
    assert_eq!(first.agent_id, "entrepreneur");

    let second = h.next_request().await;
    assert_eq!(second.last_speaker.as_deref(), Some("entrepreneur"));
    assert_eq!(second.conversation_history.len(), 1);

    h.send(Command::Pause).await;
    h.wait_for_state(ConversationState::Paused).await;

    // The call issued before the pause still lands.
    h.reply("tech", "Alex Thompson", "Meter the API.");
    let landed = h.wait_for_message().await;
    assert_eq!(landed.agent_id, "tech");
    h.assert_no_request().await;

    h.send(Command::Resume {
        input: Some("Focus on B2B.".into()),
    })
    .await;
    let injected = h.wait_for_message().await;
    assert!(injected.is_user());
    h.wait_for_state(ConversationState::Playing).await;

    let third = h.next_request().await;
    assert_eq!(third.user_input.as_deref(), Some("Focus on B2B."));
    assert_eq!(third.last_speaker.as_deref(), Some("user"));
    assert!(third.conversation_history.last().unwrap().is_user());
    assert_eq!(third.conversation_history.len(), 3);

    h.send(Command::Stop).await;
    let archived = match h
        .wait_for(|e| matches!(e, ConversationEvent::LogArchived(_)))
        .await
    {
        ConversationEvent::LogArchived(log) => log,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(archived.messages.len(), 3);
    h.wait_for_state(ConversationState::Idle).await;

    let logs = h.handle.list_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].id, archived.id);
}

#[tokio::test]
async fn failure_halts_until_retry() {
    let mut h = Harness::start();

    h.send(Command::Start {
        topic: "general".into(),
        custom_topic: None,
    })
    .await;
    h.next_request().await;
    h.fail();

    h.wait_for(|e| matches!(e, ConversationEvent::GenerationFailed(_)))
        .await;
    h.assert_no_request().await;

    h.send(Command::Retry).await;
    let retried = h.next_request().await;
    assert!(retried.conversation_history.is_empty());

    h.reply("entrepreneur", "Daniel Rodriguez", "Let's begin.");
    h.wait_for_message().await;
}

async fn fail_and_pause(h: &mut Harness) {
    h.send(Command::Start {
        topic: "general".into(),
        custom_topic: None,
    })
    .await;
    h.next_request().await;
    h.fail();
    h.wait_for(|e| matches!(e, ConversationEvent::GenerationFailed(_)))
        .await;

    h.send(Command::Pause).await;
    h.wait_for_state(ConversationState::Paused).await;
    h.assert_no_request().await;
}

#[tokio::test]
async fn resume_after_failure_issues_next_request() {
    let mut h = Harness::start();
    fail_and_pause(&mut h).await;

    h.send(Command::Resume { input: None }).await;
    h.wait_for_state(ConversationState::Playing).await;
    let resumed = h.next_request().await;
    assert!(resumed.conversation_history.is_empty());
    assert_eq!(resumed.user_input, None);

    h.reply("entrepreneur", "Daniel Rodriguez", "Back on track.");
    h.wait_for_message().await;
}

#[tokio::test]
async fn resume_with_input_after_failure_carries_the_input() {
    let mut h = Harness::start();
    fail_and_pause(&mut h).await;

    h.send(Command::Resume {
        input: Some("Consider freemium.".into()),
    })
    .await;
    let injected = h.wait_for_message().await;
    assert!(injected.is_user());
    h.wait_for_state(ConversationState::Playing).await;

    let resumed = h.next_request().await;
    assert_eq!(resumed.user_input.as_deref(), Some("Consider freemium."));
    assert_eq!(resumed.last_speaker.as_deref(), Some("user"));
    assert_eq!(resumed.conversation_history.len(), 1);
}

/// Panics on its first call, then answers every later call at once.
#[derive(Default)]
struct PanicsOnceSource {
    calls: AtomicUsize,
    topics: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl MessageSource for PanicsOnceSource {
    async fn next_message(
        &self,
        request: GenerateMessageRequest,
    ) -> Result<GeneratedMessage, GenerateError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("source blew up");
        }
        self.topics.lock().unwrap().push(request.topic);
        Ok(GeneratedMessage {
            agent_id: "entrepreneur".into(),
            agent_name: "Daniel Rodriguez".into(),
            content: "Still here.".into(),
            timestamp: Utc::now(),
        })
    }
}

async fn wait_for_appended(events: &mut broadcast::Receiver<ConversationEvent>) {
    loop {
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("event channel closed");
        if matches!(event, ConversationEvent::MessageAppended(_)) {
            return;
        }
    }
}

#[tokio::test]
async fn panicking_generation_is_reported_as_failure() {
    let source = Arc::new(PanicsOnceSource::default());
    let (handle, _task) = spawn(
        Conversation::new(LogStore::in_memory(), "general"),
        source.clone(),
    );
    let mut events = handle.subscribe();

    handle
        .send(Command::Start {
            topic: "general".into(),
            custom_topic: None,
        })
        .await
        .unwrap();
    loop {
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for the failure")
            .unwrap();
        if let ConversationEvent::GenerationFailed(err) = event {
            assert!(err.detail().contains("panicked"));
            break;
        }
    }

    handle.send(Command::Retry).await.unwrap();
    wait_for_appended(&mut events).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn panicking_generation_does_not_block_the_next_session() {
    let source = Arc::new(PanicsOnceSource::default());
    let (handle, _task) = spawn(
        Conversation::new(LogStore::in_memory(), "general"),
        source.clone(),
    );
    let mut events = handle.subscribe();

    for command in [
        Command::Start {
            topic: "general".into(),
            custom_topic: None,
        },
        Command::Stop,
        Command::Start {
            topic: "saas".into(),
            custom_topic: None,
        },
    ] {
        handle.send(command).await.unwrap();
    }

    wait_for_appended(&mut events).await;
    assert_eq!(source.topics.lock().unwrap().first().map(String::as_str), Some("saas"));
}

#[tokio::test]
async fn stale_result_after_stop_is_discarded() {
    let mut h = Harness::start();

    h.send(Command::Start {
        topic: "general".into(),
        custom_topic: None,
    })
    .await;
    h.next_request().await;

    h.send(Command::Stop).await;
    h.wait_for_state(ConversationState::Idle).await;

    h.send(Command::Start {
        topic: "mobile".into(),
        custom_topic: None,
    })
    .await;
    h.wait_for_state(ConversationState::Playing).await;
    // The old call is still in flight, so nothing new is issued yet.
    h.assert_no_request().await;

    h.reply("entrepreneur", "Daniel Rodriguez", "From the old session.");
    let fresh = h.next_request().await;
    assert_eq!(fresh.topic, "mobile");
    assert!(fresh.conversation_history.is_empty());

    while let Ok(event) = h.events.try_recv() {
        assert!(
            !matches!(event, ConversationEvent::MessageAppended(_)),
            "stale message appended: {event:?}"
        );
    }
}

#[tokio::test]
async fn invalid_commands_are_rejected() {
    let mut h = Harness::start();

    h.send(Command::Pause).await;
    let rejected = h
        .wait_for(|e| matches!(e, ConversationEvent::Rejected(_)))
        .await;
    assert!(matches!(rejected, ConversationEvent::Rejected(_)));

    h.send(Command::ViewLog { id: "missing".into() }).await;
    h.wait_for(|e| matches!(e, ConversationEvent::Rejected(_)))
        .await;
    h.assert_no_request().await;
}

#[tokio::test]
async fn viewing_a_log_archives_the_live_session() {
    let mut h = Harness::start();

    h.send(Command::Start {
        topic: "general".into(),
        custom_topic: None,
    })
    .await;
    h.next_request().await;
    h.reply("entrepreneur", "Daniel Rodriguez", "First session.");
    h.wait_for_message().await;
    h.next_request().await;
    h.send(Command::Stop).await;
    let first = match h
        .wait_for(|e| matches!(e, ConversationEvent::LogArchived(_)))
        .await
    {
        ConversationEvent::LogArchived(log) => log,
        other => panic!("unexpected event {other:?}"),
    };

    h.send(Command::Start {
        topic: "general".into(),
        custom_topic: None,
    })
    .await;
    h.wait_for_state(ConversationState::Playing).await;
    // Drains the call left over from the first session.
    h.reply("tech", "Alex Thompson", "stale");
    h.next_request().await;
    h.reply("entrepreneur", "Daniel Rodriguez", "Second session.");
    h.wait_for_message().await;

    h.send(Command::ViewLog {
        id: first.id.clone(),
    })
    .await;
    h.wait_for(|e| matches!(e, ConversationEvent::LogArchived(_)))
        .await;
    let opened = h
        .wait_for(|e| matches!(e, ConversationEvent::LogOpened(_)))
        .await;
    assert_eq!(opened, ConversationEvent::LogOpened(first));
    h.wait_for_state(ConversationState::ViewingLog).await;

    assert_eq!(h.handle.list_logs().await.unwrap().len(), 2);

    h.send(Command::CloseLog).await;
    h.wait_for_state(ConversationState::Idle).await;
}
