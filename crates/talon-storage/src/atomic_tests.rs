use super::*;
use serde::Deserialize;
use tempfile::tempdir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Sample {
    n: u32,
    s: String,
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a/b/state.json");
    let value = Sample { n: 1, s: "hi".into() };
    write_json_atomic(&path, &value).unwrap();
    let loaded: Option<Sample> = read_json_or_none(&path).unwrap();
    assert_eq!(loaded, Some(value));
}

#[test]
fn read_missing_file_is_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.json");
    let loaded: Option<Sample> = read_json_or_none(&path).unwrap();
    assert_eq!(loaded, None);
}

#[test]
fn no_tmp_file_survives_a_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    write_json_atomic(&path, &Sample { n: 1, s: "x".into() }).unwrap();
    assert!(!path.with_file_name("state.json.tmp").exists());
    assert!(path.exists());
}

#[test]
fn corrupt_file_is_rotated_and_reads_as_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"not json{{{").unwrap();
    let loaded: Option<Sample> = read_json_or_none(&path).unwrap();
    assert_eq!(loaded, None);
    assert!(path.with_extension("bak").exists());
    assert!(!path.exists());
}

#[test]
fn append_and_read_tail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    for n in 0..5 {
        append_line(&path, &Sample { n, s: format!("line{n}") }).unwrap();
    }
    let tail: Vec<Sample> = read_jsonl_tail(&path, 2).unwrap();
    assert_eq!(tail, vec![Sample { n: 3, s: "line3".into() }, Sample { n: 4, s: "line4".into() }]);
}

#[test]
fn read_tail_skips_malformed_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    std::fs::write(&path, "{\"n\":1,\"s\":\"ok\"}\nnot json\n{\"n\":2,\"s\":\"also ok\"}\n").unwrap();
    let tail: Vec<Sample> = read_jsonl_tail(&path, 10).unwrap();
    assert_eq!(tail, vec![Sample { n: 1, s: "ok".into() }, Sample { n: 2, s: "also ok".into() }]);
}

#[test]
fn read_tail_of_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    let tail: Vec<Sample> = read_jsonl_tail(&path, 10).unwrap();
    assert!(tail.is_empty());
}
