// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use strata_cli::commands::perf::{self, PerfOptions};
use strata_cli::commands::tail::{self, TailOptions};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata change-feed tools", long_about = None)]
struct Cli {
    /// Emit logs (filtered by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed an in-memory store and watch paced subscribers catch up
    Perf {
        #[arg(long, default_value_t = 20)]
        streams: usize,

        #[arg(long, default_value_t = 20)]
        commits_per_stream: u32,

        #[arg(long, default_value_t = 20)]
        subscribers: usize,

        #[arg(long, default_value_t = 10)]
        page_size: usize,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,

        /// Subscriber i waits (i + 1) * base_delay_ms per commit
        #[arg(long, default_value_t = 10)]
        base_delay_ms: u64,

        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,

        /// Print the final statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the feed from a saved checkpoint, saving progress as it goes
    Tail {
        #[arg(long, default_value = "strata.checkpoint")]
        checkpoint_file: PathBuf,

        /// Commits to seed before tailing
        #[arg(long, default_value_t = 10)]
        seed: usize,

        #[arg(long, default_value_t = 5)]
        duration_secs: u64,

        #[arg(long, default_value_t = 5000)]
        poll_ms: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        strata_node::telemetry::init_telemetry();
    }

    match cli.command {
        Commands::Perf {
            streams,
            commits_per_stream,
            subscribers,
            page_size,
            poll_ms,
            base_delay_ms,
            timeout_secs,
            json,
        } => perf::run(PerfOptions {
            streams,
            commits_per_stream,
            subscribers,
            page_size,
            poll_ms,
            base_delay_ms,
            timeout_secs,
            json,
        }),
        Commands::Tail {
            checkpoint_file,
            seed,
            duration_secs,
            poll_ms,
        } => tail::run(TailOptions {
            checkpoint_file,
            seed,
            duration: Duration::from_secs(duration_secs),
            poll_ms,
        }),
    }
}
