use super::*;

#[test]
fn parses_a_well_formed_reply() {
    let reply = parse_worker_reply(r#"Sure thing.\n{"summary": "did it", "state": "done", "commit_message": "fix"}"#);
    assert_eq!(reply.summary, "did it");
    assert_eq!(reply.state.as_deref(), Some("done"));
    assert_eq!(reply.commit_message.as_deref(), Some("fix"));
}

#[test]
fn picks_the_largest_balanced_object_when_several_are_present() {
    let text = r#"{"nope": {}} then {"summary": "the real one", "state": "blocked"}"#;
    let reply = parse_worker_reply(text);
    assert_eq!(reply.summary, "the real one");
}

#[test]
fn falls_back_to_plain_text_summary_when_nothing_parses() {
    let reply = parse_worker_reply("just some prose, no JSON here");
    assert_eq!(reply.summary, "just some prose, no JSON here");
    assert_eq!(reply.state.as_deref(), Some("done"));
}

#[test]
fn falls_back_when_json_present_but_summary_is_empty() {
    let reply = parse_worker_reply(r#"{"summary": "", "state": "done"}"#);
    assert_eq!(reply.summary, r#"{"summary": "", "state": "done"}"#);
}
