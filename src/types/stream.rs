// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-stream bookkeeping: heads and snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Latest committed revision and latest snapshot revision of one stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHead {
    pub bucket_id: String,
    pub stream_id: String,
    pub head_revision: u32,
    /// 0 when the stream has never been snapshotted.
    pub snapshot_revision: u32,
}

impl StreamHead {
    pub fn new(
        bucket_id: impl Into<String>,
        stream_id: impl Into<String>,
        head_revision: u32,
        snapshot_revision: u32,
    ) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            stream_id: stream_id.into(),
            head_revision,
            snapshot_revision,
        }
    }

    /// Number of revisions committed since the last snapshot.
    pub fn unsnapshotted(&self) -> u32 {
        self.head_revision.saturating_sub(self.snapshot_revision)
    }

    pub fn needs_snapshot(&self, max_threshold: u32) -> bool {
        self.head_revision >= self.snapshot_revision.saturating_add(max_threshold)
    }
}

/// Aggregate state of a stream captured up to `stream_revision`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bucket_id: String,
    pub stream_id: String,
    pub stream_revision: u32,
    pub payload: Value,
}

impl Snapshot {
    pub fn new(
        bucket_id: impl Into<String>,
        stream_id: impl Into<String>,
        stream_revision: u32,
        payload: impl Into<Value>,
    ) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            stream_id: stream_id.into(),
            stream_revision,
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        let head = StreamHead::new("b", "s", 10, 4);
        assert_eq!(head.unsnapshotted(), 6);
        assert!(head.needs_snapshot(6));
        assert!(!head.needs_snapshot(7));
        assert!(head.needs_snapshot(0));
    }
}
