// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! strata-node: polling change feed over any `PersistStreams` backend.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod feed;

pub use config::FeedConfig;
pub use errors::{BoxError, FeedError, Result};
pub use feed::{ClientStatistics, FeedClient, SubscriberInfo, Subscription};
