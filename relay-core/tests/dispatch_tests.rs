// ABOUTME: Integration tests for the dispatch loop and processor fan-out.
// ABOUTME: Drives Chat with scripted events from the in-memory MockChat.

use relay_core::testing::{ChatCall, MockChat};
use relay_core::{
    action, Chat, ChatEvent, ChatPlatform, DispatchMode, Message, MessageEvent, ProcessorName,
    ProcessorRegistry,
};
use std::sync::{Arc, Mutex};

/// What a recording processor saw
#[derive(Debug, Clone, PartialEq, Eq)]
struct Seen {
    processor: String,
    text: String,
    mention: bool,
    thread: bool,
    user: Option<String>,
    conversation: Option<String>,
}

fn recorder(name: &str, log: Arc<Mutex<Vec<Seen>>>) -> relay_core::SharedAction {
    let name = name.to_string();
    action(move |msg: Message| {
        let log = log.clone();
        let name = name.clone();
        async move {
            log.lock().unwrap().push(Seen {
                processor: name,
                text: msg.text().to_string(),
                mention: msg.is_mention(),
                thread: msg.is_thread(),
                user: msg.user().map(|u| u.name.clone()),
                conversation: msg.conversation().map(|c| c.name.clone()),
            });
        }
    })
}

fn connected() -> ChatEvent {
    ChatEvent::Connected {
        bot_id: "UBOT".to_string(),
        bot_name: "relay".to_string(),
        team: "acme".to_string(),
        connection_count: 1,
    }
}

fn message(id: Option<&str>, text: &str) -> ChatEvent {
    ChatEvent::Message(MessageEvent {
        client_msg_id: id.map(str::to_string),
        thread_ts: None,
        user: "U1".to_string(),
        channel: "C1".to_string(),
        text: text.to_string(),
        ts: "10.0".to_string(),
    })
}

async fn run(chat: Arc<MockChat>, registry: ProcessorRegistry) -> anyhow::Result<()> {
    let events = chat.event_stream().await?;
    let dispatcher = Arc::new(Chat::new(chat, registry, false));
    dispatcher.run(events).await
}

#[tokio::test]
async fn test_every_processor_sees_the_same_message() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    for name in ["a", "b", "c"] {
        registry
            .register(ProcessorName::new("test", name), recorder(name, log.clone()))
            .unwrap();
    }

    let chat = Arc::new(MockChat::new().with_events(vec![
        connected(),
        message(Some("m1"), "<@UBOT> hello"),
    ]));
    run(chat, registry).await.unwrap();

    let mut seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    seen.sort_by(|x, y| x.processor.cmp(&y.processor));
    let processors: Vec<&str> = seen.iter().map(|s| s.processor.as_str()).collect();
    assert_eq!(processors, vec!["a", "b", "c"]);
    for s in &seen {
        assert_eq!(s.text, "hello");
        assert!(s.mention);
        assert!(!s.thread);
        assert_eq!(s.user.as_deref(), Some("@user-U1"));
        assert_eq!(s.conversation.as_deref(), Some("#chan-C1"));
    }
}

#[tokio::test]
async fn test_incomplete_messages_are_never_dispatched() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(ProcessorName::new("test", "rec"), recorder("rec", log.clone()))
        .unwrap();

    let chat = Arc::new(MockChat::new().with_events(vec![
        connected(),
        message(None, "<@UBOT> echo"),
        message(Some(""), "<@UBOT> echo"),
    ]));
    run(chat.clone(), registry).await.unwrap();

    assert!(log.lock().unwrap().is_empty());
    assert!(chat.calls().is_empty(), "no lookups for incomplete messages");
}

#[tokio::test]
async fn test_read_failure_drops_the_message() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(ProcessorName::new("test", "rec"), recorder("rec", log.clone()))
        .unwrap();

    let chat = Arc::new(
        MockChat::new()
            .fail_lookups()
            .with_events(vec![connected(), message(Some("m1"), "<@UBOT> hi")]),
    );
    run(chat.clone(), registry).await.unwrap();

    assert!(log.lock().unwrap().is_empty());
    assert!(chat.replies().is_empty());
    assert_eq!(chat.calls(), vec![ChatCall::UserInfo("U1".to_string())]);
}

#[tokio::test]
async fn test_mention_requires_connected_identity() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(ProcessorName::new("test", "rec"), recorder("rec", log.clone()))
        .unwrap();

    // No Connected event: the bot does not know its own ID yet
    let chat = Arc::new(MockChat::new().with_events(vec![message(Some("m1"), "<@UBOT> hi")]));
    run(chat, registry).await.unwrap();

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].mention);
    assert_eq!(seen[0].text, "<@UBOT> hi");
}

#[tokio::test]
async fn test_message_uses_identity_known_at_arrival() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(ProcessorName::new("test", "rec"), recorder("rec", log.clone()))
        .unwrap();

    // Connected arrives after the message and must not reclassify it
    let chat = Arc::new(MockChat::new().with_events(vec![
        message(Some("m1"), "<@UBOT> hi"),
        connected(),
        message(Some("m2"), "<@UBOT> again"),
    ]));
    run(chat, registry).await.unwrap();

    let mut seen: Vec<(bool, String)> = log
        .lock()
        .unwrap()
        .iter()
        .map(|s| (s.mention, s.text.clone()))
        .collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (false, "<@UBOT> hi".to_string()),
            (true, "again".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_panicking_processor_does_not_stop_siblings() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(
            ProcessorName::new("test", "boom"),
            action(|_msg| async { panic!("processor blew up") }),
        )
        .unwrap();
    registry
        .register(ProcessorName::new("test", "rec"), recorder("rec", log.clone()))
        .unwrap();

    let chat = Arc::new(MockChat::new().with_events(vec![
        connected(),
        message(Some("m1"), "first"),
        message(Some("m2"), "second"),
    ]));
    run(chat, registry).await.unwrap();

    let mut texts: Vec<String> = log.lock().unwrap().iter().map(|s| s.text.clone()).collect();
    texts.sort();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn test_sequential_mode_preserves_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::with_mode(DispatchMode::Sequential);
    for name in ["first", "second", "third"] {
        registry
            .register(ProcessorName::new("test", name), recorder(name, log.clone()))
            .unwrap();
    }

    let chat = Arc::new(MockChat::new().with_events(vec![connected(), message(Some("m1"), "go")]));
    run(chat, registry).await.unwrap();

    let order: Vec<String> = log.lock().unwrap().iter().map(|s| s.processor.clone()).collect();
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_invalid_auth_ends_the_loop_with_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(ProcessorName::new("test", "rec"), recorder("rec", log.clone()))
        .unwrap();

    let chat = Arc::new(MockChat::new().with_events(vec![
        ChatEvent::InvalidAuth,
        message(Some("m1"), "never seen"),
    ]));
    let err = run(chat, registry).await.unwrap_err();

    assert!(err.to_string().contains("Invalid chat credentials"));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_lifecycle_noise_is_ignored() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ProcessorRegistry::new();
    registry
        .register(ProcessorName::new("test", "rec"), recorder("rec", log.clone()))
        .unwrap();

    let chat = Arc::new(MockChat::new().with_events(vec![
        ChatEvent::Connecting {
            attempt: 1,
            connection_count: 0,
        },
        connected(),
        ChatEvent::IncomingError {
            reason: "bad frame".to_string(),
        },
        ChatEvent::Other {
            kind: "user_typing".to_string(),
        },
        message(Some("m1"), "still works"),
        ChatEvent::Disconnected {
            reason: "eof".to_string(),
        },
    ]));
    run(chat, registry).await.unwrap();

    assert_eq!(log.lock().unwrap().len(), 1);
}
