use padkernel::job::KernelConfig;
use padkernel::job::stdio::serve;
use serde_json::{Value, json};
use std::time::Duration;

mod support;

use crate::support::SlowExecutor;

const SQUARE: &str = r#"{"outer": [{"x": 0, "y": 0}, {"x": 1, "y": 0}, {"x": 1, "y": 1}, {"x": 0, "y": 1}]}"#;

fn sanitize_line(id: Value) -> String {
    format!(r#"{{"id": {id}, "cmd": "SANITIZE_PROFILE", "profile": {SQUARE}}}"#)
}

/// Feeds `lines` to a stdio server and returns the replies it wrote.
async fn exchange(config: KernelConfig, executor: &SlowExecutor, lines: &[String]) -> Vec<Value> {
    let input = lines.join("\n");
    let mut output = Vec::new();
    let shared = executor.clone();
    serve(&config, input.as_bytes(), &mut output, move |_| shared.clone())
        .await
        .expect("serve");
    String::from_utf8(output)
        .expect("utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("reply is JSON"))
        .collect()
}

fn reply_for<'a>(replies: &'a [Value], id: &Value) -> &'a Value {
    replies
        .iter()
        .find(|r| &r["id"] == id)
        .unwrap_or_else(|| panic!("no reply for {id} in {replies:?}"))
}

#[tokio::test]
async fn cancel_and_malformed_lines_get_no_reply() {
    let executor = SlowExecutor::new(Duration::from_millis(200));
    let lines = [
        sanitize_line(json!("a")),
        sanitize_line(json!("b")),
        r#"{"id": "b", "cmd": "CANCEL"}"#.to_string(),
        "this is not json".to_string(),
        r#"{"cmd": "SANITIZE_PROFILE"}"#.to_string(),
        String::new(),
        r#"{"id": 7, "cmd": "NOPE"}"#.to_string(),
    ];

    let replies = exchange(KernelConfig::default(), &executor, &lines).await;

    assert_eq!(replies.len(), 2, "{replies:?}");
    let a = reply_for(&replies, &json!("a"));
    assert_eq!(a["ok"], true);
    assert_eq!(a["result"]["outer"].as_array().map(Vec::len), Some(4));

    let unknown = reply_for(&replies, &json!(7));
    assert_eq!(unknown["ok"], false);
    assert_eq!(unknown["error"], "Unknown cmd: NOPE");

    // The cancelled job was skipped before it started
    assert_eq!(executor.ran(), 1);
}

#[tokio::test]
async fn requests_past_the_slot_limit_are_refused() {
    let config = KernelConfig {
        max_in_flight: 1,
        ..KernelConfig::default()
    };
    let executor = SlowExecutor::new(Duration::from_millis(200));
    let lines = [sanitize_line(json!(1)), sanitize_line(json!(2))];

    let replies = exchange(config, &executor, &lines).await;

    assert_eq!(replies.len(), 2, "{replies:?}");
    assert_eq!(reply_for(&replies, &json!(1))["ok"], true);
    let refused = reply_for(&replies, &json!(2));
    assert_eq!(refused["ok"], false);
    assert_eq!(refused["error"], "kernel busy: 1 jobs in flight");
    assert_eq!(executor.ran(), 1);
}

#[tokio::test]
async fn reused_live_id_is_refused() {
    let executor = SlowExecutor::new(Duration::from_millis(200));
    let lines = [sanitize_line(json!("same")), sanitize_line(json!("same"))];

    let replies = exchange(KernelConfig::default(), &executor, &lines).await;

    assert_eq!(replies.len(), 2, "{replies:?}");
    // The refusal is written first, while the original job still runs
    assert_eq!(replies[0]["ok"], false);
    assert_eq!(replies[0]["error"], "job same is already in flight");
    assert_eq!(replies[1]["ok"], true);
    assert_eq!(executor.ran(), 1);
}
