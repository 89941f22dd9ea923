use super::*;
use std::collections::HashMap;

fn input(text: &str) -> EngineInput {
    EngineInput {
        session_key: "slack:general:main".to_string(),
        route: "slack:general:main".to_string(),
        text: text.to_string(),
        sender_id: "U1".to_string(),
        metadata: HashMap::new(),
        context_lines: vec![],
        raw_event: None,
        recent_attachments: vec![],
    }
}

#[tokio::test]
async fn echoes_input_when_no_reply_is_queued() {
    let engine = FakeEngine::new();
    let out = engine.complete(input("ping"), CancellationToken::new()).await.unwrap();
    assert_eq!(out.text, "echo: ping");
    assert_eq!(engine.call_count(), 1);
}

#[tokio::test]
async fn replies_are_consumed_in_fifo_order() {
    let engine = FakeEngine::new();
    engine.push_reply("first");
    engine.push_reply("second");
    let a = engine.complete(input("1"), CancellationToken::new()).await.unwrap();
    let b = engine.complete(input("2"), CancellationToken::new()).await.unwrap();
    assert_eq!(a.text, "first");
    assert_eq!(b.text, "second");
}

#[tokio::test]
async fn queued_errors_are_returned() {
    let engine = FakeEngine::new();
    engine.push_error(EngineError::Timeout);
    let err = engine.complete(input("x"), CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout));
}

#[tokio::test]
async fn calls_record_session_key_and_text() {
    let engine = FakeEngine::new();
    engine.complete(input("hi"), CancellationToken::new()).await.unwrap();
    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].session_key, "slack:general:main");
    assert_eq!(calls[0].text, "hi");
}
