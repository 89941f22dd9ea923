use super::*;

#[test]
fn engine_input_round_trips_through_json() {
    let input = EngineInput {
        session_key: "slack:general:main".to_string(),
        route: "slack:general:main".to_string(),
        text: "hello".to_string(),
        sender_id: "u1".to_string(),
        metadata: HashMap::new(),
        context_lines: vec![ContextLine { role: "user".to_string(), text: "hi".to_string(), at_ms: 1 }],
        raw_event: None,
        recent_attachments: vec![],
    };
    let json = serde_json::to_string(&input).unwrap();
    let back: EngineInput = serde_json::from_str(&json).unwrap();
    assert_eq!(back.session_key, input.session_key);
    assert_eq!(back.context_lines.len(), 1);
}

#[test]
fn engine_error_messages_are_stable() {
    assert_eq!(EngineError::Timeout.to_string(), "engine call timed out");
    assert_eq!(EngineError::Cancelled.to_string(), "engine call was cancelled");
}
