use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use gilga::{
    backend::memory::MemoryBackend,
    domain::{
        text::{format_relative_time, linkify},
        Message, RawMessage, SenderKey,
    },
    model::MessageStream,
    session::{ChatSession, Handshake},
};
use pretty_assertions::assert_eq;
use rstest::*;

fn message(id: &str, sender: &str, timestamp: u64) -> Message {
    Message {
        id: id.to_string(),
        sender: SenderKey::from(sender),
        display_name: sender.to_string(),
        content: format!("content of {id}"),
        timestamp,
        is_post: false,
    }
}

fn ids(stream: &MessageStream) -> Vec<&str> {
    stream.iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn test_ingest_is_idempotent() {
    let mut once = MessageStream::new();
    once.ingest(message("a", "alice", 10));

    let mut twice = MessageStream::new();
    twice.ingest(message("a", "alice", 10));
    twice.ingest(message("a", "alice", 10));

    assert_eq!(once.as_slice(), twice.as_slice());
}

#[test]
fn test_order_is_by_timestamp_with_stable_ties() {
    let mut stream = MessageStream::new();
    stream.ingest_batch([
        message("late", "alice", 30),
        message("tie-1", "bob", 20),
        message("early", "carol", 10),
        message("tie-2", "dave", 20),
    ]);

    assert_eq!(ids(&stream), vec!["early", "tie-1", "tie-2", "late"]);
}

#[test]
fn test_bounded_to_newest_hundred() {
    let mut stream = MessageStream::new();
    stream.ingest_batch((0..150).map(|i| message(&format!("m{i}"), "alice", i)));

    assert_eq!(stream.len(), 100);
    assert_eq!(stream.as_slice()[0].id, "m50");
    assert_eq!(stream.as_slice()[99].id, "m149");
}

#[test]
fn test_visible_does_not_mutate() {
    let mut stream = MessageStream::new();
    stream.ingest_batch([message("a", "alice", 1), message("b", "bob", 2)]);
    let muted: HashSet<SenderKey> = [SenderKey::from("bob")].into_iter().collect();

    assert_eq!(stream.visible(&muted).len(), 1);
    assert_eq!(stream.len(), 2);
}

#[rstest]
#[case(59_999, "now")]
#[case(60_000, "1 min ago")]
#[case(3_599_999, "59 min ago")]
fn test_formatter_boundaries(#[case] elapsed_ms: i64, #[case] expected: &str) {
    let t: u64 = 1_700_000_000;
    let now = Utc
        .timestamp_millis_opt(t as i64 * 1000 + elapsed_ms)
        .single()
        .expect("valid time");

    assert_eq!(format_relative_time(t, &now), expected);
}

#[test]
fn test_formatter_hour_boundary_leaves_minutes() {
    let t: u64 = 1_700_000_000;
    let now = Utc
        .timestamp_millis_opt(t as i64 * 1000 + 3_600_000)
        .single()
        .expect("valid time");

    // 2023-11-14 22:13:20 UTC, an hour earlier on the same day
    assert_eq!(format_relative_time(t, &now), "22:13");
}

#[test]
fn test_linkify_round_trip() {
    let input = "see https://example.com/x now";
    let segments = linkify(input);

    let rebuilt: String = segments.iter().map(|s| s.raw()).collect();
    assert_eq!(rebuilt, input);
    let labels: Vec<&str> = segments
        .iter()
        .filter(|s| s.is_link())
        .map(|s| s.display())
        .collect();
    assert_eq!(labels, vec!["example.com"]);
}

#[tokio::test]
async fn test_concurrent_delivery_keeps_first_content() {
    let backend = Arc::new(MemoryBackend::new());
    let mut session = ChatSession::mount(Arc::clone(&backend));
    session
        .finish_connect(Ok(Handshake::default()))
        .expect("connected");

    let first = RawMessage {
        id: String::from("dup"),
        pubkey: String::from("alice"),
        author: String::from("alice"),
        content: String::from("first"),
        timestamp: 100,
        is_post: false,
    };
    let second = RawMessage {
        content: String::from("second"),
        ..first.clone()
    };
    backend.push(first);
    backend.push(second);
    session.drain_events();

    let visible = session.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].content, "first");
}
