// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use strata_kernel::error::PersistenceError;
use thiserror::Error;

/// Error returned by a subscriber callback. Logged and counted, never propagated.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Feed client disposed")]
    Disposed,
    #[error("Feed client must be created inside a tokio runtime")]
    NoRuntime,
    #[error("Invalid feed configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
