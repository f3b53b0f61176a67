// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Another commit already holds this sequence slot. Reload and retry.
    #[error("Concurrency conflict on {bucket_id}/{stream_id} at commit sequence {commit_sequence}")]
    Concurrency {
        bucket_id: String,
        stream_id: String,
        commit_sequence: u32,
    },

    /// The exact attempt was already accepted; treat as success.
    #[error("Duplicate commit {commit_id} on {bucket_id}/{stream_id} at commit sequence {commit_sequence}")]
    DuplicateCommit {
        bucket_id: String,
        stream_id: String,
        commit_id: Uuid,
        commit_sequence: u32,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Persistence engine already disposed")]
    Disposed,

    #[error("Invalid checkpoint token: {0:?}")]
    InvalidCheckpoint(String),

    #[error("Invalid commit attempt: {0}")]
    InvalidAttempt(String),
}

impl PersistenceError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, PersistenceError::Concurrency { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PersistenceError::DuplicateCommit { .. })
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
