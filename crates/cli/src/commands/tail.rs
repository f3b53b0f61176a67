// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::Context;
use chrono::SecondsFormat;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strata_kernel::{fixtures, Commit, InMemoryEngine};
use strata_node::{FeedClient, FeedConfig};
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
pub struct TailOptions {
    pub checkpoint_file: PathBuf,
    /// Commits seeded into the in-memory store before tailing.
    pub seed: usize,
    pub duration: Duration,
    pub poll_ms: u64,
}

#[derive(Debug, Default)]
pub struct TailReport {
    pub delivered: usize,
    pub last_checkpoint: Option<String>,
}

/// Saved checkpoint token, or `None` when nothing has been saved yet.
pub fn load_checkpoint(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let token = raw.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

pub fn save_checkpoint(path: &Path, token: &str) -> anyhow::Result<()> {
    std::fs::write(path, token).with_context(|| format!("writing {}", path.display()))
}

fn describe(commit: &Commit) -> String {
    format!(
        "Bucket {} Stream {} Commit {} @ {} [{}]",
        commit.bucket_id(),
        commit.stream_id(),
        commit.commit_sequence(),
        commit.checkpoint_token(),
        commit.commit_stamp().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Tail the store from the saved checkpoint, saving each delivered token.
pub async fn execute<W: Write>(options: &TailOptions, out: &mut W) -> anyhow::Result<TailReport> {
    let store = Arc::new(InMemoryEngine::new());
    fixtures::seed_streams(store.as_ref(), options.seed).context("seeding the store")?;

    let config = FeedConfig {
        polling_interval: Duration::from_millis(options.poll_ms),
        ..Default::default()
    };
    let client = FeedClient::new(store, config)?;

    let from = load_checkpoint(&options.checkpoint_file)?;
    writeln!(out, "Tailing from checkpoint {}", from.as_deref().unwrap_or("<origin>"))?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = client.subscribe_fn(from.as_deref(), move |commit| {
        tx.send(commit).map_err(|e| e.to_string().into())
    })?;

    let mut report = TailReport::default();
    let deadline = tokio::time::sleep(options.duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = rx.recv() => {
                let Some(commit) = received else { break };
                writeln!(out, "{}", describe(&commit))?;
                let token = commit.checkpoint_token();
                save_checkpoint(&options.checkpoint_file, &token)?;
                report.delivered += 1;
                report.last_checkpoint = Some(token);
            }
        }
    }

    subscription.dispose();
    client.dispose();
    writeln!(out, "Delivered {} commits", report.delivered)?;
    Ok(report)
}

pub fn run(options: TailOptions) -> anyhow::Result<()> {
    let runtime = super::runtime()?;
    let mut stdout = std::io::stdout();
    runtime.block_on(execute(&options, &mut stdout))?;
    Ok(())
}
