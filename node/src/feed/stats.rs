// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::Serialize;
use std::time::Duration;
use strata_kernel::types::Checkpoint;
use uuid::Uuid;

/// Point-in-time view of one subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubscriberInfo {
    pub subscriber_id: Uuid,
    /// Checkpoint of the last commit fetched for this subscriber.
    pub current_checkpoint: Checkpoint,
    pub queue_length: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClientStatistics {
    pub polling_interval: Duration,
    pub page_size: usize,
    pub backpressure_threshold: usize,
    pub subscribers: Vec<SubscriberInfo>,
}

impl ClientStatistics {
    pub fn total_queued(&self) -> usize {
        self.subscribers.iter().map(|s| s.queue_length).sum()
    }
}
