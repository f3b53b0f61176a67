// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Polling change feed.
//!
//! A `FeedClient` reads the global commit order of a `PersistStreams` backend
//! page by page and fans it out to subscribers, each with its own queue and
//! cursor.
//!
//! # Guarantees
//! - Every subscriber sees every visible commit after its starting
//!   checkpoint, in checkpoint order, at least once.
//! - One poll cycle runs at a time; triggers that arrive while a cycle is
//!   running are dropped and picked up by the next trigger or timer tick.
//! - A subscriber asks for the next page after every delivery that leaves
//!   its queue below the backpressure threshold.
//! - A subscriber whose queue already holds a full page is skipped until it
//!   drains.
//! - Store reads run on the blocking pool, never on a runtime worker.

mod cache;
mod stats;
mod subscriber;

pub use cache::{Page, PageCache};
pub use stats::{ClientStatistics, SubscriberInfo};
pub use subscriber::{CommitFuture, Subscription};

use crate::config::FeedConfig;
use crate::errors::{BoxError, FeedError, Result};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use strata_kernel::error::PersistenceError;
use strata_kernel::persistence::PersistStreams;
use strata_kernel::types::{Checkpoint, Commit};
use subscriber::{Handler, Subscriber};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

pub(crate) struct Inner {
    persistence: Arc<dyn PersistStreams>,
    config: FeedConfig,
    runtime: Handle,
    subscribers: RwLock<HashMap<Uuid, Arc<Subscriber>>>,
    cache: PageCache,
    polling: AtomicBool,
    disposed: AtomicBool,
    stats: watch::Sender<ClientStatistics>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn registered(&self) -> Vec<Arc<Subscriber>> {
        match self.subscribers.read() {
            Ok(subscribers) => subscribers.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    fn register(&self, subscriber: Arc<Subscriber>) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|p| p.into_inner());
        subscribers.insert(subscriber.id(), subscriber);
        metrics::gauge!("strata_subscribers_active", subscribers.len() as f64);
    }

    pub(crate) fn unregister(&self, id: Uuid) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|p| p.into_inner());
        if subscribers.remove(&id).is_some() {
            metrics::gauge!("strata_subscribers_active", subscribers.len() as f64);
            tracing::debug!("Subscriber {} unregistered", id);
        }
    }

    fn collect_statistics(&self) -> ClientStatistics {
        let mut subscribers: Vec<_> = self.registered().iter().map(|s| s.info()).collect();
        subscribers.sort_by_key(|s| s.subscriber_id);
        ClientStatistics {
            polling_interval: self.config.polling_interval,
            page_size: self.config.page_size,
            backpressure_threshold: self.config.threshold(),
            subscribers,
        }
    }

    /// Start a poll cycle on the runtime unless one is already running.
    pub(crate) fn trigger_poll(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }
        if !self.claim_poll() {
            tracing::trace!("Poll already in flight");
            return;
        }
        let inner = self.clone();
        self.runtime.spawn(async move {
            inner.poll_cycle().await;
            inner.polling.store(false, Ordering::Release);
        });
    }

    fn claim_poll(&self) -> bool {
        self.polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    async fn poll_cycle(self: &Arc<Self>) {
        metrics::increment_counter!("strata_poll_cycles_total");
        for subscriber in self.registered() {
            if subscriber.is_disposed() || subscriber.queue_length() >= self.config.page_size {
                continue;
            }
            let after = subscriber.checkpoint();
            match self.page_after(after).await {
                Ok(page) if page.is_empty() => {}
                Ok(page) => {
                    let queued = subscriber.enqueue(&page);
                    tracing::debug!(
                        "Queued {} commits after checkpoint {} for subscriber {}",
                        queued,
                        after,
                        subscriber.id()
                    );
                    subscriber.schedule_push(&self.runtime, Arc::downgrade(self));
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch page after {} for subscriber {}: {}", after, subscriber.id(), e);
                }
            }
        }
    }

    async fn page_after(&self, after: Checkpoint) -> Result<Page> {
        if let Some(page) = self.cache.get(after) {
            metrics::increment_counter!("strata_page_cache_hits_total");
            return Ok(page);
        }
        metrics::increment_counter!("strata_page_cache_misses_total");

        let persistence = self.persistence.clone();
        let limit = self.config.page_size;
        let started = Instant::now();
        let commits = tokio::task::spawn_blocking(move || persistence.get_page(after, limit))
            .await
            .map_err(|e| PersistenceError::Storage(format!("page read task failed: {e}")))??;
        metrics::histogram!("strata_page_fetch_duration_seconds", started.elapsed().as_secs_f64());

        let page: Page = commits.into();
        self.cache.insert(after, page.clone());
        Ok(page)
    }

    fn spawn_ticker<F>(self: &Arc<Self>, period: Duration, on_tick: F) -> JoinHandle<()>
    where
        F: Fn(&Arc<Inner>) + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if inner.is_disposed() {
                    break;
                }
                on_tick(&inner);
            }
        })
    }
}

/// Polling change-feed client. Dropping it stops the timers.
pub struct FeedClient {
    inner: Arc<Inner>,
}

impl FeedClient {
    /// Must be called from within a tokio runtime.
    pub fn new(persistence: Arc<dyn PersistStreams>, config: FeedConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| FeedError::NoRuntime)?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| FeedError::InvalidConfig("cache capacity must be at least 1 page".into()))?;

        let (stats, _) = watch::channel(ClientStatistics {
            polling_interval: config.polling_interval,
            page_size: config.page_size,
            backpressure_threshold: config.threshold(),
            subscribers: Vec::new(),
        });
        let inner = Arc::new(Inner {
            persistence,
            cache: PageCache::new(capacity, config.page_size),
            config,
            runtime,
            subscribers: RwLock::new(HashMap::new()),
            polling: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            stats,
            tasks: Mutex::new(Vec::new()),
        });

        let poller = inner.spawn_ticker(inner.config.polling_interval, |inner| inner.trigger_poll());
        let reporter = inner.spawn_ticker(inner.config.stats_interval, |inner| {
            inner.stats.send_replace(inner.collect_statistics());
        });
        inner.tasks.lock().unwrap_or_else(|p| p.into_inner()).extend([poller, reporter]);

        tracing::info!(
            "Feed client started: polling every {:?}, page size {}, threshold {}",
            inner.config.polling_interval,
            inner.config.page_size,
            inner.config.threshold()
        );
        Ok(Self { inner })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    /// Subscribe from the commit after `from_checkpoint` (`None` = origin).
    pub fn subscribe<F, Fut>(&self, from_checkpoint: Option<&str>, on_commit: F) -> Result<Subscription>
    where
        F: Fn(Commit) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |commit: Commit| -> CommitFuture { on_commit(commit).boxed() });
        self.register(from_checkpoint, handler)
    }

    /// Like `subscribe`, for callbacks that do not need to await.
    pub fn subscribe_fn<F>(&self, from_checkpoint: Option<&str>, on_commit: F) -> Result<Subscription>
    where
        F: Fn(Commit) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        let handler: Handler =
            Arc::new(move |commit: Commit| -> CommitFuture { futures::future::ready(on_commit(commit)).boxed() });
        self.register(from_checkpoint, handler)
    }

    fn register(&self, from_checkpoint: Option<&str>, handler: Handler) -> Result<Subscription> {
        if self.inner.is_disposed() {
            return Err(FeedError::Disposed);
        }
        let from = self.inner.persistence.get_checkpoint(from_checkpoint)?;
        let subscriber = Arc::new(Subscriber::new(from, self.inner.config.threshold(), handler));
        tracing::info!("Subscriber {} registered from checkpoint {}", subscriber.id(), from);

        self.inner.register(subscriber.clone());
        self.inner.trigger_poll();
        Ok(Subscription::new(subscriber, Arc::downgrade(&self.inner)))
    }

    /// Run a poll cycle now unless one is already in flight.
    pub fn retrieve_now(&self) {
        self.inner.trigger_poll();
    }

    /// Statistics refreshed every `stats_interval`. Yields the latest value first.
    pub fn statistics(&self) -> WatchStream<ClientStatistics> {
        WatchStream::new(self.inner.stats.subscribe())
    }

    pub fn current_statistics(&self) -> ClientStatistics {
        self.inner.collect_statistics()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registered().len()
    }

    /// Cached full pages.
    pub fn cached_pages(&self) -> usize {
        self.inner.cache.len()
    }

    /// Drop every cached page.
    ///
    /// Call after purging or deleting from the store; otherwise subscribers
    /// starting behind the purge keep reading the cached pages.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        tracing::debug!("Page cache cleared");
    }

    /// Stop the timers. Queued commits still drain; new subscriptions fail.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let tasks = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(|p| p.into_inner()));
        for task in tasks {
            task.abort();
        }
        tracing::info!("Feed client disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        self.dispose();
    }
}
