// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;
use strata_cli::commands::perf::{self, PerfOptions};
use strata_cli::commands::tail::{self, TailOptions};
use tempfile::tempdir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_perf_run_delivers_everything() {
    let options = PerfOptions {
        streams: 4,
        commits_per_stream: 5,
        subscribers: 3,
        page_size: 5,
        poll_ms: 50,
        base_delay_ms: 1,
        timeout_secs: 30,
        json: true,
    };
    let mut out = Vec::new();
    let report = perf::execute(&options, &mut out).await.unwrap();

    assert_eq!(report.total_commits, 20);
    assert_eq!(report.delivered, vec![20, 20, 20]);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Seeding event store...complete (20 commits)"));
    assert!(text.contains("\"page_size\": 5"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tail_resumes_from_saved_checkpoint() {
    let dir = tempdir().unwrap();
    let checkpoint_file = dir.path().join("tail.checkpoint");
    let options = TailOptions {
        checkpoint_file: checkpoint_file.clone(),
        seed: 6,
        duration: Duration::from_millis(500),
        poll_ms: 50,
    };

    assert_eq!(tail::load_checkpoint(&checkpoint_file).unwrap(), None);

    let mut out = Vec::new();
    let first = tail::execute(&options, &mut out).await.unwrap();
    assert_eq!(first.delivered, 6);
    assert_eq!(first.last_checkpoint.as_deref(), Some("6"));
    assert_eq!(tail::load_checkpoint(&checkpoint_file).unwrap().as_deref(), Some("6"));

    // a fresh store seeded with ten commits: only the four past the saved token arrive
    let options = TailOptions { seed: 10, ..options };
    let mut out = Vec::new();
    let second = tail::execute(&options, &mut out).await.unwrap();
    assert_eq!(second.delivered, 4);
    assert_eq!(second.last_checkpoint.as_deref(), Some("10"));

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Tailing from checkpoint 6"));
    assert_eq!(text.lines().filter(|l| l.starts_with("Bucket default")).count(), 4);
}

#[test]
fn test_blank_checkpoint_file_means_origin() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blank");
    std::fs::write(&path, "  \n").unwrap();
    assert_eq!(tail::load_checkpoint(&path).unwrap(), None);

    tail::save_checkpoint(&path, "42").unwrap();
    assert_eq!(tail::load_checkpoint(&path).unwrap().as_deref(), Some("42"));
}
