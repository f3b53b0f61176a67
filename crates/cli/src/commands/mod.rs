// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod perf;
pub mod tail;

/// Multi-threaded runtime for commands invoked from the synchronous `main`.
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}
