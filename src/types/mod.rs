// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod checkpoint;
pub mod commit;
pub mod stream;

pub use checkpoint::Checkpoint;
pub use commit::{Commit, CommitAttempt, EventMessage, Headers};
pub use stream::{Snapshot, StreamHead};
