// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Pipeline hooks around any `PersistStreams` backend.
//!
//! Hooks observe reads and destructive operations. They may rewrite or drop a
//! commit on its way out of a read, but they never author writes: `commit`
//! and snapshot calls reach the wrapped backend untouched.

use crate::error::Result;
use crate::persistence::PersistStreams;
use crate::types::{Checkpoint, Commit, CommitAttempt, Snapshot, StreamHead};
use std::sync::Arc;

pub trait PipelineHook: Send + Sync {
    /// Transform a commit being read. `None` hides it from this read.
    fn select(&self, commit: Commit) -> Option<Commit>;

    /// Called after a purge. `None` means every bucket was purged.
    fn on_purge(&self, _bucket_id: Option<&str>) {}

    fn on_delete_stream(&self, _bucket_id: &str, _stream_id: &str) {}

    /// Name used in log lines.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

pub struct PipelineDecorator<P> {
    inner: P,
    hooks: Vec<Arc<dyn PipelineHook>>,
}

impl<P: PersistStreams> PipelineDecorator<P> {
    pub fn new(inner: P, hooks: Vec<Arc<dyn PipelineHook>>) -> Self {
        Self { inner, hooks }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn hooks(&self) -> &[Arc<dyn PipelineHook>] {
        &self.hooks
    }

    fn filter(&self, commit: Commit) -> Option<Commit> {
        let commit_id = commit.commit_id();
        let mut current = commit;
        for hook in &self.hooks {
            match hook.select(current) {
                Some(next) => current = next,
                None => {
                    tracing::info!("Pipeline hook {} skipped commit {}", hook.name(), commit_id);
                    return None;
                }
            }
        }
        Some(current)
    }

    fn execute_hooks(&self, commits: Vec<Commit>) -> Vec<Commit> {
        commits.into_iter().filter_map(|c| self.filter(c)).collect()
    }
}

impl<P: PersistStreams> PersistStreams for PipelineDecorator<P> {
    fn initialize(&self) -> Result<()> {
        self.inner.initialize()
    }

    fn commit(&self, attempt: CommitAttempt) -> Result<Commit> {
        self.inner.commit(attempt)
    }

    fn get_from(
        &self,
        bucket_id: &str,
        stream_id: &str,
        min_revision: u32,
        max_revision: u32,
    ) -> Result<Vec<Commit>> {
        let commits = self.inner.get_from(bucket_id, stream_id, min_revision, max_revision)?;
        Ok(self.execute_hooks(commits))
    }

    fn get_from_checkpoint(&self, checkpoint_token: Option<&str>) -> Result<Vec<Commit>> {
        let commits = self.inner.get_from_checkpoint(checkpoint_token)?;
        Ok(self.execute_hooks(commits))
    }

    // Keeps reading past vetoed commits so a page is only short when the
    // backend is exhausted. Otherwise a run of vetoed commits would pin a
    // feed cursor in place.
    fn get_page(&self, after: Checkpoint, limit: usize) -> Result<Vec<Commit>> {
        let mut page = Vec::new();
        let mut cursor = after;
        while page.len() < limit {
            let want = limit - page.len();
            let raw = self.inner.get_page(cursor, want)?;
            let exhausted = raw.len() < want;
            if let Some(last) = raw.last() {
                cursor = last.checkpoint();
            }
            page.extend(self.execute_hooks(raw));
            if exhausted {
                break;
            }
        }
        Ok(page)
    }

    fn get_checkpoint(&self, checkpoint_token: Option<&str>) -> Result<Checkpoint> {
        self.inner.get_checkpoint(checkpoint_token)
    }

    fn get_streams_to_snapshot(&self, bucket_id: &str, max_threshold: u32) -> Result<Vec<StreamHead>> {
        self.inner.get_streams_to_snapshot(bucket_id, max_threshold)
    }

    fn get_snapshot(&self, bucket_id: &str, stream_id: &str, max_revision: u32) -> Result<Option<Snapshot>> {
        self.inner.get_snapshot(bucket_id, stream_id, max_revision)
    }

    fn add_snapshot(&self, snapshot: Snapshot) -> Result<bool> {
        self.inner.add_snapshot(snapshot)
    }

    fn purge(&self) -> Result<()> {
        self.inner.purge()?;
        for hook in &self.hooks {
            hook.on_purge(None);
        }
        Ok(())
    }

    fn purge_bucket(&self, bucket_id: &str) -> Result<()> {
        self.inner.purge_bucket(bucket_id)?;
        for hook in &self.hooks {
            hook.on_purge(Some(bucket_id));
        }
        Ok(())
    }

    fn drop_all(&self) -> Result<()> {
        self.inner.drop_all()
    }

    fn delete_stream(&self, bucket_id: &str, stream_id: &str) -> Result<()> {
        self.inner.delete_stream(bucket_id, stream_id)?;
        for hook in &self.hooks {
            hook.on_delete_stream(bucket_id, stream_id);
        }
        Ok(())
    }

    fn dispose(&self) {
        self.inner.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}
