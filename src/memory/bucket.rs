// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-bucket commit state.
//!
//! Everything a bucket knows lives in one `BucketState` behind one mutex, so
//! the identity sets, the head map and the log can never disagree.

use crate::error::{PersistenceError, Result};
use crate::types::{Checkpoint, Commit, CommitAttempt, Snapshot, StreamHead};
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Identity used to recognise a verbatim retry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DuplicateIdentity {
    stream_id: String,
    commit_id: Uuid,
    commit_sequence: u32,
}

/// Identity used to recognise two writers racing for one sequence slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ConflictIdentity {
    stream_id: String,
    commit_sequence: u32,
}

#[derive(Default)]
pub(crate) struct BucketState {
    /// Append order. Checkpoints are assigned under the bucket lock, so this
    /// is also checkpoint order.
    commits: Vec<Commit>,
    duplicates: FxHashSet<DuplicateIdentity>,
    conflicts: FxHashMap<ConflictIdentity, Uuid>,
    heads: FxHashMap<String, StreamHead>,
    snapshots: Vec<Snapshot>,
}

impl BucketState {
    /// Apply the duplicate check, then the conflict check, then append.
    ///
    /// `next_checkpoint` is only invoked once both checks pass, so a rejected
    /// attempt never consumes a checkpoint.
    pub(crate) fn commit(
        &mut self,
        attempt: CommitAttempt,
        next_checkpoint: impl FnOnce() -> Checkpoint,
    ) -> Result<Commit> {
        let duplicate = DuplicateIdentity {
            stream_id: attempt.stream_id.clone(),
            commit_id: attempt.commit_id,
            commit_sequence: attempt.commit_sequence,
        };
        if self.duplicates.contains(&duplicate) {
            return Err(PersistenceError::DuplicateCommit {
                bucket_id: attempt.bucket_id,
                stream_id: attempt.stream_id,
                commit_id: attempt.commit_id,
                commit_sequence: attempt.commit_sequence,
            });
        }

        let conflict = ConflictIdentity {
            stream_id: attempt.stream_id.clone(),
            commit_sequence: attempt.commit_sequence,
        };
        if let Some(occupant) = self.conflicts.get(&conflict) {
            tracing::debug!(
                "Sequence {} of {}/{} already held by commit {}",
                attempt.commit_sequence,
                attempt.bucket_id,
                attempt.stream_id,
                occupant
            );
            return Err(PersistenceError::Concurrency {
                bucket_id: attempt.bucket_id,
                stream_id: attempt.stream_id,
                commit_sequence: attempt.commit_sequence,
            });
        }

        let commit = Commit::new(attempt, next_checkpoint());

        self.duplicates.insert(duplicate);
        self.conflicts.insert(conflict, commit.commit_id());

        let snapshot_revision = self
            .heads
            .get(commit.stream_id())
            .map(|head| head.snapshot_revision)
            .unwrap_or(0);
        tracing::debug!("Updating stream head for {}", commit.stream_id());
        self.heads.insert(
            commit.stream_id().to_string(),
            StreamHead::new(
                commit.bucket_id(),
                commit.stream_id(),
                commit.stream_revision(),
                snapshot_revision,
            ),
        );

        self.commits.push(commit.clone());
        Ok(commit)
    }

    pub(crate) fn get_from(&self, stream_id: &str, min_revision: u32, max_revision: u32) -> Vec<Commit> {
        let mut found: Vec<Commit> = self
            .commits
            .iter()
            .filter(|c| c.stream_id() == stream_id && c.overlaps(min_revision, max_revision))
            .cloned()
            .collect();
        found.sort_by_key(|c| c.commit_sequence());
        found
    }

    /// Commits with `checkpoint > after` and `checkpoint <= visible`, at most `limit`.
    pub(crate) fn after_checkpoint(&self, after: Checkpoint, visible: Checkpoint, limit: usize) -> Vec<Commit> {
        let start = self.commits.partition_point(|c| c.checkpoint() <= after);
        self.commits[start..]
            .iter()
            .take_while(|c| c.checkpoint() <= visible)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Everything from the first commit stamped at or after `start`, in append order.
    pub(crate) fn from_stamp(&self, start: DateTime<Utc>) -> Vec<Commit> {
        match self.commits.iter().position(|c| c.commit_stamp() >= start) {
            Some(first) => self.commits[first..].to_vec(),
            None => Vec::new(),
        }
    }

    /// The append-order slice spanning the first to the last commit stamped
    /// within `[start, end)`.
    pub(crate) fn from_stamp_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Commit> {
        let in_range = |c: &Commit| c.commit_stamp() >= start && c.commit_stamp() < end;
        let first = self.commits.iter().position(in_range);
        let last = self.commits.iter().rposition(in_range);
        match (first, last) {
            (Some(first), Some(last)) => self.commits[first..=last].to_vec(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn streams_to_snapshot(&self, max_threshold: u32) -> Vec<StreamHead> {
        let mut heads: Vec<StreamHead> = self
            .heads
            .values()
            .filter(|head| head.needs_snapshot(max_threshold))
            .cloned()
            .collect();
        heads.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));
        heads
    }

    pub(crate) fn snapshot(&self, stream_id: &str, max_revision: u32) -> Option<Snapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.stream_id == stream_id && s.stream_revision <= max_revision)
            .max_by_key(|s| s.stream_revision)
            .cloned()
    }

    pub(crate) fn add_snapshot(&mut self, snapshot: Snapshot) -> bool {
        let Some(head) = self.heads.get_mut(&snapshot.stream_id) else {
            return false;
        };
        head.snapshot_revision = snapshot.stream_revision;
        self.snapshots.push(snapshot);
        true
    }

    pub(crate) fn purge(&mut self) {
        self.commits.clear();
        self.snapshots.clear();
        self.heads.clear();
        self.conflicts.clear();
        self.duplicates.clear();
    }

    pub(crate) fn delete_stream(&mut self, stream_id: &str) {
        self.commits.retain(|c| c.stream_id() != stream_id);
        self.snapshots.retain(|s| s.stream_id != stream_id);
        self.heads.remove(stream_id);
        self.conflicts.retain(|identity, _| identity.stream_id != stream_id);
        self.duplicates.retain(|identity| identity.stream_id != stream_id);
    }

    pub(crate) fn len(&self) -> usize {
        self.commits.len()
    }
}

/// A bucket handle shared between the registry and in-flight operations.
#[derive(Default)]
pub(crate) struct Bucket {
    state: Mutex<BucketState>,
}

impl Bucket {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, BucketState>> {
        self.state
            .lock()
            .map_err(|_| PersistenceError::Storage("bucket state lock poisoned".into()))
    }
}
