// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Bucket used when the caller does not name one.
pub const DEFAULT_BUCKET: &str = "default";

/// Number of commits fetched per page by readers that page.
pub const DEFAULT_PAGE_SIZE: usize = 512;

/// Poll interval of the change feed, in milliseconds.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 5000;
