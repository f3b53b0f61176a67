// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Commit attempts and accepted commits.
//!
//! # Invariants
//! - An attempt is never stored as-is; the engine turns it into a `Commit`.
//! - A `Commit` carries its checkpoint for life and exposes no mutators.
//! - Revisions are 1-based: a commit covers
//!   `[stream_revision - events.len() + 1, stream_revision]`.

use crate::error::{PersistenceError, Result};
use crate::types::checkpoint::Checkpoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Ordered header map attached to commits and events.
pub type Headers = BTreeMap<String, Value>;

/// A single domain event. The body is never interpreted by the store.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct EventMessage {
    pub headers: Headers,
    pub body: Value,
}

impl EventMessage {
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// A proposed append to a stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitAttempt {
    pub bucket_id: String,
    pub stream_id: String,
    /// Stream revision after this commit is applied.
    pub stream_revision: u32,
    /// Caller-chosen token; resubmitting the same id is an idempotent retry.
    pub commit_id: Uuid,
    /// Expected per-stream sequence number of this commit (1-based).
    pub commit_sequence: u32,
    pub commit_stamp: DateTime<Utc>,
    pub headers: Headers,
    pub events: Vec<EventMessage>,
}

impl CommitAttempt {
    /// Revision of the first event carried by this attempt.
    pub fn first_revision(&self) -> u32 {
        self.stream_revision
            .saturating_sub(self.events.len() as u32)
            .saturating_add(1)
    }

    /// Reject attempts that could never form a well-ordered commit.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_id.trim().is_empty() {
            return Err(PersistenceError::InvalidAttempt("bucket id is empty".into()));
        }
        if self.stream_id.trim().is_empty() {
            return Err(PersistenceError::InvalidAttempt("stream id is empty".into()));
        }
        if self.commit_id.is_nil() {
            return Err(PersistenceError::InvalidAttempt("commit id is nil".into()));
        }
        if self.commit_sequence == 0 {
            return Err(PersistenceError::InvalidAttempt(
                "commit sequence must be at least 1".into(),
            ));
        }
        if self.stream_revision == 0 {
            return Err(PersistenceError::InvalidAttempt(
                "stream revision must be at least 1".into(),
            ));
        }
        if self.events.is_empty() {
            return Err(PersistenceError::InvalidAttempt("attempt carries no events".into()));
        }
        if (self.stream_revision as usize) < self.events.len() {
            return Err(PersistenceError::InvalidAttempt(format!(
                "stream revision {} is lower than the {} events carried",
                self.stream_revision,
                self.events.len()
            )));
        }
        Ok(())
    }
}

/// An accepted, immutable commit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    bucket_id: String,
    stream_id: String,
    stream_revision: u32,
    commit_id: Uuid,
    commit_sequence: u32,
    commit_stamp: DateTime<Utc>,
    checkpoint: Checkpoint,
    headers: Headers,
    events: Vec<EventMessage>,
}

impl Commit {
    /// Seal an attempt with the checkpoint the store assigned to it.
    pub fn new(attempt: CommitAttempt, checkpoint: Checkpoint) -> Self {
        Self {
            bucket_id: attempt.bucket_id,
            stream_id: attempt.stream_id,
            stream_revision: attempt.stream_revision,
            commit_id: attempt.commit_id,
            commit_sequence: attempt.commit_sequence,
            commit_stamp: attempt.commit_stamp,
            checkpoint,
            headers: attempt.headers,
            events: attempt.events,
        }
    }

    pub fn bucket_id(&self) -> &str {
        &self.bucket_id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn stream_revision(&self) -> u32 {
        self.stream_revision
    }

    pub fn commit_id(&self) -> Uuid {
        self.commit_id
    }

    pub fn commit_sequence(&self) -> u32 {
        self.commit_sequence
    }

    pub fn commit_stamp(&self) -> DateTime<Utc> {
        self.commit_stamp
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// Opaque string form of the checkpoint, suitable for external storage.
    pub fn checkpoint_token(&self) -> String {
        self.checkpoint.token()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn events(&self) -> &[EventMessage] {
        &self.events
    }

    pub fn first_revision(&self) -> u32 {
        self.stream_revision
            .saturating_sub(self.events.len() as u32)
            .saturating_add(1)
    }

    /// True if any revision carried by this commit lies in `[min, max]`.
    pub fn overlaps(&self, min_revision: u32, max_revision: u32) -> bool {
        self.stream_revision >= min_revision && self.first_revision() <= max_revision
    }

    /// Split back into the attempt and its checkpoint.
    ///
    /// Pipeline hooks use this to produce a transformed copy; the stored
    /// commit is unaffected.
    pub fn into_parts(self) -> (CommitAttempt, Checkpoint) {
        let checkpoint = self.checkpoint;
        let attempt = CommitAttempt {
            bucket_id: self.bucket_id,
            stream_id: self.stream_id,
            stream_revision: self.stream_revision,
            commit_id: self.commit_id,
            commit_sequence: self.commit_sequence,
            commit_stamp: self.commit_stamp,
            headers: self.headers,
            events: self.events,
        };
        (attempt, checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_validate_accepts_well_formed_attempt() {
        let attempt = fixtures::attempt("stream-1", 2, 1, 2);
        assert!(attempt.validate().is_ok());
        assert_eq!(attempt.first_revision(), 1);
    }

    #[test]
    fn test_validate_rejects_malformed_attempts() {
        let mut no_events = fixtures::attempt("s", 1, 1, 1);
        no_events.events.clear();
        assert!(matches!(no_events.validate(), Err(PersistenceError::InvalidAttempt(_))));

        let zero_sequence = fixtures::attempt("s", 1, 0, 1);
        assert!(zero_sequence.validate().is_err());

        let mut nil_id = fixtures::attempt("s", 1, 1, 1);
        nil_id.commit_id = Uuid::nil();
        assert!(nil_id.validate().is_err());

        // revision 1 cannot hold 3 events
        let short_revision = fixtures::attempt("s", 1, 1, 3);
        assert!(short_revision.validate().is_err());

        let mut blank_stream = fixtures::attempt("s", 1, 1, 1);
        blank_stream.stream_id = "  ".into();
        assert!(blank_stream.validate().is_err());
    }

    #[test]
    fn test_overlap_uses_full_revision_range() {
        // covers revisions 3..=5
        let commit = Commit::new(fixtures::attempt("s", 5, 2, 3), Checkpoint::from_raw(1));
        assert_eq!(commit.first_revision(), 3);
        assert!(commit.overlaps(1, 3));
        assert!(commit.overlaps(5, 9));
        assert!(commit.overlaps(4, 4));
        assert!(!commit.overlaps(1, 2));
        assert!(!commit.overlaps(6, 10));
    }

    #[test]
    fn test_into_parts_preserves_fields() {
        let attempt = fixtures::attempt("s", 1, 1, 1);
        let commit = Commit::new(attempt.clone(), Checkpoint::from_raw(7));
        let (back, checkpoint) = commit.into_parts();
        assert_eq!(back, attempt);
        assert_eq!(checkpoint.value(), 7);
    }
}
