// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Persistence contract.
//!
//! Every backend (the in-memory engine, the pipeline decorator, external
//! durable stores) implements `PersistStreams`. Implementations must be safe
//! to share between threads and may block on I/O.
//!
//! # Guarantees expected from implementors
//! - `commit` is atomic: either the whole attempt is stored or nothing is.
//! - Each accepted commit receives exactly one checkpoint, strictly greater
//!   than every checkpoint issued before it by the same instance.
//! - After `dispose`, every operation fails with `PersistenceError::Disposed`.

use crate::config::DEFAULT_BUCKET;
use crate::error::Result;
use crate::types::{Checkpoint, Commit, CommitAttempt, Snapshot, StreamHead};

pub trait PersistStreams: Send + Sync {
    /// Prepare the storage for use. Idempotent.
    fn initialize(&self) -> Result<()>;

    /// Append an attempt, returning the accepted commit with its checkpoint.
    ///
    /// Fails with `DuplicateCommit` for a verbatim retry and `Concurrency`
    /// when a different commit already holds the sequence slot.
    fn commit(&self, attempt: CommitAttempt) -> Result<Commit>;

    /// Commits of one stream overlapping `[min_revision, max_revision]`,
    /// ordered by commit sequence.
    fn get_from(
        &self,
        bucket_id: &str,
        stream_id: &str,
        min_revision: u32,
        max_revision: u32,
    ) -> Result<Vec<Commit>>;

    /// Every commit, across all buckets, strictly after the token, ordered by
    /// checkpoint. `None` reads from the beginning.
    fn get_from_checkpoint(&self, checkpoint_token: Option<&str>) -> Result<Vec<Commit>>;

    /// At most `limit` commits strictly after `after`, ordered by checkpoint.
    fn get_page(&self, after: Checkpoint, limit: usize) -> Result<Vec<Commit>> {
        let token = after.token();
        let mut commits = self.get_from_checkpoint(Some(&token))?;
        commits.truncate(limit);
        Ok(commits)
    }

    /// Parse and validate a token without touching stored data.
    fn get_checkpoint(&self, checkpoint_token: Option<&str>) -> Result<Checkpoint>;

    /// Heads whose `head_revision >= snapshot_revision + max_threshold`.
    fn get_streams_to_snapshot(&self, bucket_id: &str, max_threshold: u32) -> Result<Vec<StreamHead>>;

    /// Most recent snapshot at or below `max_revision`.
    fn get_snapshot(&self, bucket_id: &str, stream_id: &str, max_revision: u32) -> Result<Option<Snapshot>>;

    /// Store a snapshot. Returns false when the stream has no head.
    fn add_snapshot(&self, snapshot: Snapshot) -> Result<bool>;

    /// Destroy every stream in every bucket.
    fn purge(&self) -> Result<()>;

    /// Destroy every stream in one bucket.
    fn purge_bucket(&self, bucket_id: &str) -> Result<()>;

    /// Destroy all contents and any schema backing them.
    fn drop_all(&self) -> Result<()>;

    fn delete_stream(&self, bucket_id: &str, stream_id: &str) -> Result<()>;

    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// Default-bucket conveniences available on every backend.
pub trait PersistStreamsExt: PersistStreams {
    fn delete_default_stream(&self, stream_id: &str) -> Result<()> {
        self.delete_stream(DEFAULT_BUCKET, stream_id)
    }

    fn get_from_start(&self) -> Result<Vec<Commit>> {
        self.get_from_checkpoint(None)
    }

    fn get_stream(&self, stream_id: &str, min_revision: u32, max_revision: u32) -> Result<Vec<Commit>> {
        self.get_from(DEFAULT_BUCKET, stream_id, min_revision, max_revision)
    }

    fn streams_to_snapshot(&self, max_threshold: u32) -> Result<Vec<StreamHead>> {
        self.get_streams_to_snapshot(DEFAULT_BUCKET, max_threshold)
    }
}

impl<T: PersistStreams + ?Sized> PersistStreamsExt for T {}
