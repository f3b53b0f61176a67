// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Builders for commit attempts and snapshots used by tests, benchmarks and
//! the CLI seeding commands.

use crate::config::DEFAULT_BUCKET;
use crate::error::Result;
use crate::persistence::PersistStreams;
use crate::types::{Commit, CommitAttempt, EventMessage, Headers, Snapshot};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

/// Attempt on the default bucket carrying `event_count` numbered events.
///
/// Not validated: callers may deliberately build malformed attempts.
pub fn attempt(stream_id: &str, stream_revision: u32, commit_sequence: u32, event_count: usize) -> CommitAttempt {
    attempt_in(DEFAULT_BUCKET, stream_id, stream_revision, commit_sequence, event_count)
}

pub fn attempt_in(
    bucket_id: &str,
    stream_id: &str,
    stream_revision: u32,
    commit_sequence: u32,
    event_count: usize,
) -> CommitAttempt {
    let first = stream_revision.saturating_sub(event_count as u32).saturating_add(1);
    let mut headers = Headers::new();
    headers.insert("A header".into(), json!("A string value"));
    headers.insert("Another header".into(), json!(2));
    CommitAttempt {
        bucket_id: bucket_id.to_string(),
        stream_id: stream_id.to_string(),
        stream_revision,
        commit_id: Uuid::new_v4(),
        commit_sequence,
        commit_stamp: Utc::now(),
        headers,
        events: (0..event_count as u32)
            .map(|i| {
                EventMessage::new(json!({ "revision": first + i }))
                    .with_header("event.kind", "numbered")
            })
            .collect(),
    }
}

/// Single-event attempt whose body is `body`.
pub fn message_attempt(stream_id: &str, stream_revision: u32, commit_sequence: u32, body: &str) -> CommitAttempt {
    let mut attempt = attempt(stream_id, stream_revision, commit_sequence, 1);
    attempt.events = vec![EventMessage::new(body)];
    attempt
}

/// Attempt that directly follows `previous` on the same stream.
pub fn next_attempt(previous: &Commit, event_count: usize) -> CommitAttempt {
    attempt_in(
        previous.bucket_id(),
        previous.stream_id(),
        previous.stream_revision() + event_count as u32,
        previous.commit_sequence() + 1,
        event_count,
    )
}

pub fn snapshot(bucket_id: &str, stream_id: &str, stream_revision: u32) -> Snapshot {
    Snapshot::new(bucket_id, stream_id, stream_revision, json!({ "at": stream_revision }))
}

/// Commit `count` single-event commits, each to a fresh default-bucket stream.
pub fn seed_streams(store: &dyn PersistStreams, count: usize) -> Result<Vec<Commit>> {
    (0..count)
        .map(|i| store.commit(message_attempt(&Uuid::new_v4().to_string(), 1, 1, &format!("Message {i}"))))
        .collect()
}

/// Commit `commits_per_stream` sequential commits to each of `streams` streams.
pub fn seed_sequential(store: &dyn PersistStreams, streams: usize, commits_per_stream: u32) -> Result<Vec<Commit>> {
    let mut committed = Vec::with_capacity(streams * commits_per_stream as usize);
    for _ in 0..streams {
        let stream_id = Uuid::new_v4().to_string();
        let mut last = store.commit(message_attempt(&stream_id, 1, 1, "message"))?;
        committed.push(last.clone());
        for _ in 1..commits_per_stream {
            last = store.commit(next_attempt(&last, 1))?;
            committed.push(last.clone());
        }
    }
    Ok(committed)
}
