// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-Memory Commit Engine
//!
//! The reference implementation of `PersistStreams`. Durable backends must
//! behave exactly like this engine.
//!
//! # Concurrency
//! - One mutex per bucket guards that bucket's log, identity sets, heads and
//!   snapshots. The registry lock is held only long enough to find or create
//!   a bucket handle, so buckets never block each other.
//! - The checkpoint counter is a single atomic shared by all buckets and is
//!   incremented exactly once per accepted commit.
//! - Checkpoint readers only see the prefix of checkpoints whose commits are
//!   all appended (see `CommitBarrier`), so a reader can never observe
//!   checkpoint `n + 1` and later discover `n`.
//! - Publishing is the one place buckets touch: a committer that drew
//!   checkpoint `n + 1` waits in `CommitBarrier::publish` until the committer
//!   holding `n` has appended, even when that one is in another bucket. The
//!   wait covers an in-flight append only; no bucket lock is held during it.

mod bucket;

use crate::error::{PersistenceError, Result};
use crate::persistence::PersistStreams;
use crate::types::{Checkpoint, Commit, CommitAttempt, Snapshot, StreamHead};
use bucket::Bucket;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};

/// Publishes checkpoints in order.
///
/// Commits in different buckets can finish appending out of checkpoint
/// order. A commit is made visible only once every lower checkpoint is.
#[derive(Default)]
struct CommitBarrier {
    published: Mutex<u64>,
    advanced: Condvar,
}

impl CommitBarrier {
    fn publish(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut published = self.published.lock().map_err(barrier_poisoned)?;
        while *published + 1 < checkpoint.value() {
            published = self.advanced.wait(published).map_err(barrier_poisoned)?;
        }
        *published = checkpoint.value();
        self.advanced.notify_all();
        Ok(())
    }

    fn visible(&self) -> Result<Checkpoint> {
        let published = self.published.lock().map_err(barrier_poisoned)?;
        Ok(Checkpoint::from_raw(*published))
    }
}

fn barrier_poisoned<T>(_: T) -> PersistenceError {
    PersistenceError::Storage("commit barrier lock poisoned".into())
}

#[derive(Default)]
pub struct InMemoryEngine {
    buckets: RwLock<FxHashMap<String, Arc<Bucket>>>,
    checkpoint: AtomicU64,
    barrier: CommitBarrier,
    disposed: AtomicBool,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            tracing::warn!("Persistence engine already disposed");
            return Err(PersistenceError::Disposed);
        }
        Ok(())
    }

    fn registry_poisoned<T>(_: T) -> PersistenceError {
        PersistenceError::Storage("bucket registry lock poisoned".into())
    }

    fn find_bucket(&self, bucket_id: &str) -> Result<Option<Arc<Bucket>>> {
        let buckets = self.buckets.read().map_err(Self::registry_poisoned)?;
        Ok(buckets.get(bucket_id).cloned())
    }

    fn bucket_or_create(&self, bucket_id: &str) -> Result<Arc<Bucket>> {
        if let Some(bucket) = self.find_bucket(bucket_id)? {
            return Ok(bucket);
        }
        let mut buckets = self.buckets.write().map_err(Self::registry_poisoned)?;
        Ok(buckets.entry(bucket_id.to_string()).or_default().clone())
    }

    fn all_buckets(&self) -> Result<Vec<Arc<Bucket>>> {
        let buckets = self.buckets.read().map_err(Self::registry_poisoned)?;
        Ok(buckets.values().cloned().collect())
    }

    /// Highest checkpoint issued so far, including ones still being published.
    pub fn last_checkpoint(&self) -> Checkpoint {
        Checkpoint::from_raw(self.checkpoint.load(Ordering::Acquire))
    }

    /// Number of commits currently held across all buckets.
    pub fn commit_count(&self) -> Result<usize> {
        let mut total = 0;
        for bucket in self.all_buckets()? {
            total += bucket.lock()?.len();
        }
        Ok(total)
    }

    /// Every commit in `bucket_id` from the first one stamped at or after `start`.
    ///
    /// Specific to this engine; durable backends are not required to index stamps.
    pub fn get_from_stamp(&self, bucket_id: &str, start: DateTime<Utc>) -> Result<Vec<Commit>> {
        self.ensure_not_disposed()?;
        tracing::debug!("Getting commits of bucket {} from {}", bucket_id, start);
        match self.find_bucket(bucket_id)? {
            Some(bucket) => Ok(bucket.lock()?.from_stamp(start)),
            None => Ok(Vec::new()),
        }
    }

    /// Commits in `bucket_id` spanning those stamped within `[start, end)`.
    pub fn get_from_stamp_range(
        &self,
        bucket_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Commit>> {
        self.ensure_not_disposed()?;
        tracing::debug!("Getting commits of bucket {} from {} to {}", bucket_id, start, end);
        match self.find_bucket(bucket_id)? {
            Some(bucket) => Ok(bucket.lock()?.from_stamp_range(start, end)),
            None => Ok(Vec::new()),
        }
    }

    fn read_after(&self, after: Checkpoint, limit: usize) -> Result<Vec<Commit>> {
        let visible = self.barrier.visible()?;
        let mut merged = Vec::new();
        for bucket in self.all_buckets()? {
            merged.extend(bucket.lock()?.after_checkpoint(after, visible, limit));
        }
        merged.sort_by_key(|c| c.checkpoint());
        merged.truncate(limit);
        Ok(merged)
    }
}

impl PersistStreams for InMemoryEngine {
    fn initialize(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        tracing::info!("Initializing in-memory persistence engine");
        Ok(())
    }

    fn commit(&self, attempt: CommitAttempt) -> Result<Commit> {
        self.ensure_not_disposed()?;
        attempt.validate()?;
        tracing::debug!(
            "Attempting to commit {} to {}/{} at sequence {}",
            attempt.commit_id,
            attempt.bucket_id,
            attempt.stream_id,
            attempt.commit_sequence
        );

        let bucket = self.bucket_or_create(&attempt.bucket_id)?;
        let commit = {
            let mut state = bucket.lock()?;
            state.commit(attempt, || {
                Checkpoint::from_raw(self.checkpoint.fetch_add(1, Ordering::AcqRel) + 1)
            })?
        };
        self.barrier.publish(commit.checkpoint())?;

        tracing::debug!(
            "Committed {} to {}/{} at checkpoint {}",
            commit.commit_id(),
            commit.bucket_id(),
            commit.stream_id(),
            commit.checkpoint()
        );
        Ok(commit)
    }

    fn get_from(
        &self,
        bucket_id: &str,
        stream_id: &str,
        min_revision: u32,
        max_revision: u32,
    ) -> Result<Vec<Commit>> {
        self.ensure_not_disposed()?;
        tracing::debug!(
            "Getting commits of {}/{} from revision {} to {}",
            bucket_id,
            stream_id,
            min_revision,
            max_revision
        );
        match self.find_bucket(bucket_id)? {
            Some(bucket) => Ok(bucket.lock()?.get_from(stream_id, min_revision, max_revision)),
            None => Ok(Vec::new()),
        }
    }

    fn get_from_checkpoint(&self, checkpoint_token: Option<&str>) -> Result<Vec<Commit>> {
        self.ensure_not_disposed()?;
        let after = Checkpoint::parse(checkpoint_token)?;
        tracing::debug!("Getting all commits from checkpoint {}", after);
        self.read_after(after, usize::MAX)
    }

    fn get_page(&self, after: Checkpoint, limit: usize) -> Result<Vec<Commit>> {
        self.ensure_not_disposed()?;
        tracing::debug!("Getting up to {} commits from checkpoint {}", limit, after);
        self.read_after(after, limit)
    }

    fn get_checkpoint(&self, checkpoint_token: Option<&str>) -> Result<Checkpoint> {
        self.ensure_not_disposed()?;
        Checkpoint::parse(checkpoint_token)
    }

    fn get_streams_to_snapshot(&self, bucket_id: &str, max_threshold: u32) -> Result<Vec<StreamHead>> {
        self.ensure_not_disposed()?;
        tracing::debug!("Getting streams of bucket {} to snapshot at threshold {}", bucket_id, max_threshold);
        match self.find_bucket(bucket_id)? {
            Some(bucket) => Ok(bucket.lock()?.streams_to_snapshot(max_threshold)),
            None => Ok(Vec::new()),
        }
    }

    fn get_snapshot(&self, bucket_id: &str, stream_id: &str, max_revision: u32) -> Result<Option<Snapshot>> {
        self.ensure_not_disposed()?;
        tracing::debug!("Getting snapshot of {}/{} at or below revision {}", bucket_id, stream_id, max_revision);
        match self.find_bucket(bucket_id)? {
            Some(bucket) => Ok(bucket.lock()?.snapshot(stream_id, max_revision)),
            None => Ok(None),
        }
    }

    fn add_snapshot(&self, snapshot: Snapshot) -> Result<bool> {
        self.ensure_not_disposed()?;
        tracing::debug!(
            "Adding snapshot of {}/{} at revision {}",
            snapshot.bucket_id,
            snapshot.stream_id,
            snapshot.stream_revision
        );
        match self.find_bucket(&snapshot.bucket_id)? {
            Some(bucket) => Ok(bucket.lock()?.add_snapshot(snapshot)),
            None => Ok(false),
        }
    }

    fn purge(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        tracing::warn!("Purging all buckets");
        for bucket in self.all_buckets()? {
            bucket.lock()?.purge();
        }
        Ok(())
    }

    fn purge_bucket(&self, bucket_id: &str) -> Result<()> {
        self.ensure_not_disposed()?;
        tracing::warn!("Purging bucket {}", bucket_id);
        let mut buckets = self.buckets.write().map_err(Self::registry_poisoned)?;
        buckets.remove(bucket_id);
        Ok(())
    }

    fn drop_all(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        tracing::warn!("Dropping all buckets");
        let mut buckets = self.buckets.write().map_err(Self::registry_poisoned)?;
        buckets.clear();
        Ok(())
    }

    fn delete_stream(&self, bucket_id: &str, stream_id: &str) -> Result<()> {
        self.ensure_not_disposed()?;
        tracing::warn!("Deleting stream {} from bucket {}", stream_id, bucket_id);
        if let Some(bucket) = self.find_bucket(bucket_id)? {
            bucket.lock()?.delete_stream(stream_id);
        }
        Ok(())
    }

    fn dispose(&self) {
        tracing::info!("Disposing in-memory persistence engine");
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
