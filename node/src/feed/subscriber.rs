// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-subscriber queue and push loop.
//!
//! # Guarantees
//! - Commits reach the callback one at a time, in the order they were queued.
//! - At most one push loop runs per subscriber.
//! - A failing or panicking callback is logged and counted; delivery goes on.

use super::{Inner, SubscriberInfo};
use crate::errors::BoxError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use strata_kernel::types::{Checkpoint, Commit};
use tokio::runtime::Handle;
use uuid::Uuid;

pub type CommitFuture = BoxFuture<'static, Result<(), BoxError>>;
pub(crate) type Handler = Arc<dyn Fn(Commit) -> CommitFuture + Send + Sync>;

pub(crate) struct Subscriber {
    id: Uuid,
    checkpoint: AtomicU64,
    queue: Mutex<VecDeque<Commit>>,
    queue_len: AtomicUsize,
    threshold: usize,
    on_commit: Handler,
    pushing: AtomicBool,
    disposed: AtomicBool,
}

impl Subscriber {
    pub(crate) fn new(from: Checkpoint, threshold: usize, on_commit: Handler) -> Self {
        Self {
            id: Uuid::new_v4(),
            checkpoint: AtomicU64::new(from.value()),
            queue: Mutex::new(VecDeque::new()),
            queue_len: AtomicUsize::new(0),
            threshold,
            on_commit,
            pushing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Checkpoint of the last commit queued; the next page starts after it.
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint::from_raw(self.checkpoint.load(Ordering::Acquire))
    }

    pub(crate) fn queue_length(&self) -> usize {
        self.queue_len.load(Ordering::Acquire)
    }

    pub(crate) fn info(&self) -> SubscriberInfo {
        SubscriberInfo {
            subscriber_id: self.id,
            current_checkpoint: self.checkpoint(),
            queue_length: self.queue_length(),
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // Queue entries are plain commits; a panic elsewhere cannot corrupt them.
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Commit>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue every commit of `page` past the cursor and advance it.
    ///
    /// Commits at or below the cursor are skipped, so a page raced by two
    /// fetches is never delivered twice.
    pub(crate) fn enqueue(&self, page: &[Commit]) -> usize {
        if self.is_disposed() {
            return 0;
        }
        let mut queue = self.lock_queue();
        let start = self.checkpoint();
        let mut cursor = start;
        let before = queue.len();
        for commit in page.iter().filter(|c| c.checkpoint() > start) {
            cursor = commit.checkpoint();
            queue.push_back(commit.clone());
        }
        self.checkpoint.store(cursor.value(), Ordering::Release);
        self.queue_len.store(queue.len(), Ordering::Release);
        queue.len() - before
    }

    fn dequeue(&self) -> Option<Commit> {
        let mut queue = self.lock_queue();
        let commit = queue.pop_front();
        self.queue_len.store(queue.len(), Ordering::Release);
        commit
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut queue = self.lock_queue();
        queue.clear();
        self.queue_len.store(0, Ordering::Release);
        tracing::debug!("Subscriber {} disposed", self.id);
    }

    /// Start the push loop unless one is already running.
    pub(crate) fn schedule_push(self: &Arc<Self>, runtime: &Handle, feed: Weak<Inner>) {
        if self.is_disposed() || self.queue_length() == 0 {
            return;
        }
        if self
            .pushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let subscriber = self.clone();
        runtime.spawn(async move { subscriber.push_loop(feed).await });
    }

    async fn push_loop(self: Arc<Self>, feed: Weak<Inner>) {
        loop {
            while !self.is_disposed() {
                let Some(commit) = self.dequeue() else { break };
                let remaining = self.queue_length();
                self.deliver(commit).await;

                // below the threshold: ask for the next page
                if remaining < self.threshold {
                    if let Some(feed) = feed.upgrade() {
                        feed.trigger_poll();
                    }
                }
            }
            self.pushing.store(false, Ordering::Release);

            // a page may have landed between the last dequeue and the release
            if self.is_disposed() || self.queue_length() == 0 {
                return;
            }
            if self
                .pushing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
        }
    }

    async fn deliver(&self, commit: Commit) {
        let checkpoint = commit.checkpoint();
        let on_commit = self.on_commit.clone();
        let outcome = AssertUnwindSafe(async move { on_commit(commit).await })
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                metrics::counter!("strata_commits_delivered_total", 1);
            }
            Ok(Err(e)) => {
                metrics::increment_counter!("strata_delivery_failures_total");
                tracing::warn!("Subscriber {} failed on commit at checkpoint {}: {}", self.id, checkpoint, e);
            }
            Err(_) => {
                metrics::increment_counter!("strata_delivery_failures_total");
                tracing::error!("Subscriber {} panicked on commit at checkpoint {}", self.id, checkpoint);
            }
        }
    }
}

/// Handle returned by `FeedClient::subscribe`. Dropping it unsubscribes.
pub struct Subscription {
    subscriber: Arc<Subscriber>,
    feed: Weak<Inner>,
}

impl Subscription {
    pub(crate) fn new(subscriber: Arc<Subscriber>, feed: Weak<Inner>) -> Self {
        Self { subscriber, feed }
    }

    pub fn id(&self) -> Uuid {
        self.subscriber.id()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.subscriber.checkpoint()
    }

    pub fn queue_length(&self) -> usize {
        self.subscriber.queue_length()
    }

    /// Stop delivery after the in-flight commit and unregister.
    pub fn dispose(&self) {
        self.subscriber.dispose();
        if let Some(feed) = self.feed.upgrade() {
            feed.unregister(self.subscriber.id());
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.subscriber.is_disposed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}
