// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{bail, Context};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use futures::StreamExt;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_kernel::{fixtures, InMemoryEngine};
use strata_node::{BoxError, ClientStatistics, FeedClient, FeedConfig};

#[derive(Clone, Debug)]
pub struct PerfOptions {
    pub streams: usize,
    pub commits_per_stream: u32,
    pub subscribers: usize,
    pub page_size: usize,
    pub poll_ms: u64,
    /// Subscriber `i` sleeps `(i + 1) * base_delay_ms` per commit.
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub json: bool,
}

impl Default for PerfOptions {
    fn default() -> Self {
        Self {
            streams: 20,
            commits_per_stream: 20,
            subscribers: 20,
            page_size: 10,
            poll_ms: 500,
            base_delay_ms: 10,
            timeout_secs: 600,
            json: false,
        }
    }
}

#[derive(Debug)]
pub struct PerfReport {
    pub total_commits: usize,
    pub delivered: Vec<usize>,
    pub elapsed: Duration,
}

pub fn render_statistics(stats: &ClientStatistics) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Subscriber", "Checkpoint", "Queue"]);
    for info in &stats.subscribers {
        table.add_row(vec![
            info.subscriber_id.to_string(),
            info.current_checkpoint.token(),
            info.queue_length.to_string(),
        ]);
    }
    table
}

/// Seed a store, attach paced subscribers and report until all have caught up.
pub async fn execute<W: Write>(options: &PerfOptions, out: &mut W) -> anyhow::Result<PerfReport> {
    let store = Arc::new(InMemoryEngine::new());
    write!(out, "Seeding event store...")?;
    let seeded = fixtures::seed_sequential(store.as_ref(), options.streams, options.commits_per_stream)
        .context("seeding the store")?;
    writeln!(out, "complete ({} commits)", seeded.len())?;
    let total = seeded.len();

    let config = FeedConfig {
        polling_interval: Duration::from_millis(options.poll_ms),
        page_size: options.page_size,
        ..Default::default()
    };
    let client = FeedClient::new(store, config)?;

    let started = Instant::now();
    let mut counters = Vec::with_capacity(options.subscribers);
    let mut subscriptions = Vec::with_capacity(options.subscribers);
    for i in 0..options.subscribers {
        let delay = Duration::from_millis((i as u64 + 1) * options.base_delay_ms);
        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        subscriptions.push(client.subscribe(None, move |_commit| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(delay).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        })?);
        counters.push(received);
    }

    let all_done = |counters: &[Arc<AtomicUsize>]| counters.iter().all(|c| c.load(Ordering::SeqCst) >= total);
    let deadline = Duration::from_secs(options.timeout_secs);
    let mut feed = client.statistics();
    while !all_done(&counters) {
        if started.elapsed() > deadline {
            bail!("subscribers did not catch up within {:?}", deadline);
        }
        match tokio::time::timeout(Duration::from_secs(2), feed.next()).await {
            Ok(Some(stats)) => writeln!(out, "{}", render_statistics(&stats))?,
            Ok(None) => bail!("statistics feed closed"),
            Err(_) => {}
        }
    }

    let final_stats = client.current_statistics();
    if options.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&final_stats)?)?;
    } else {
        writeln!(out, "{}", render_statistics(&final_stats))?;
    }
    let report = PerfReport {
        total_commits: total,
        delivered: counters.iter().map(|c| c.load(Ordering::SeqCst)).collect(),
        elapsed: started.elapsed(),
    };
    writeln!(
        out,
        "{} subscribers received {} commits each in {:.2}s",
        options.subscribers,
        total,
        report.elapsed.as_secs_f64()
    )?;

    drop(subscriptions);
    client.dispose();
    Ok(report)
}

pub fn run(options: PerfOptions) -> anyhow::Result<()> {
    let runtime = super::runtime()?;
    let mut stdout = std::io::stdout();
    runtime.block_on(execute(&options, &mut stdout))?;
    Ok(())
}
