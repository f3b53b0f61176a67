// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! strata-kernel: optimistic commit/checkpoint engine for event-sourced streams.
//!
//! Streams live in buckets; each append is a `CommitAttempt` checked for
//! duplicates and conflicts, then sealed with a global `Checkpoint`.

pub mod config;
pub mod error;
pub mod types;
pub mod persistence;
pub mod memory;
pub mod pipeline;
pub mod fixtures;

pub use error::{PersistenceError, Result};
pub use memory::InMemoryEngine;
pub use persistence::{PersistStreams, PersistStreamsExt};
pub use pipeline::{PipelineDecorator, PipelineHook};
pub use types::{Checkpoint, Commit, CommitAttempt, EventMessage, Headers, Snapshot, StreamHead};

#[cfg(test)]
pub mod tests;
