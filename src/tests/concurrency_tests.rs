// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::fixtures;
use crate::memory::InMemoryEngine;
use crate::persistence::PersistStreams;
use crate::types::Checkpoint;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_parallel_commits_get_contiguous_checkpoints() {
    const THREADS: usize = 8;
    const PER_THREAD: u32 = 50;

    let engine = Arc::new(InMemoryEngine::new());
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = engine.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let bucket = format!("bucket-{}", t % 3);
                let stream = format!("stream-{t}");
                let mut checkpoints = Vec::new();
                for seq in 1..=PER_THREAD {
                    let commit = engine
                        .commit(fixtures::attempt_in(&bucket, &stream, seq, seq, 1))
                        .unwrap();
                    checkpoints.push(commit.checkpoint().value());
                }
                checkpoints
            })
        })
        .collect();

    let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all.sort_unstable();

    let expected: Vec<u64> = (1..=(THREADS as u64 * PER_THREAD as u64)).collect();
    assert_eq!(all, expected);

    // a full read sees every commit in checkpoint order
    let read = engine.get_from_checkpoint(None).unwrap();
    assert_eq!(read.len(), expected.len());
    assert!(read.windows(2).all(|w| w[0].checkpoint() < w[1].checkpoint()));
}

#[test]
fn test_racing_same_sequence_admits_exactly_one() {
    const RACERS: usize = 6;

    let engine = Arc::new(InMemoryEngine::new());
    let start = Arc::new(Barrier::new(RACERS));

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let engine = engine.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                engine.commit(fixtures::attempt("contested", 1, 1, 1))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.is_concurrency()));

    // losers never consumed a checkpoint
    assert_eq!(engine.last_checkpoint(), Checkpoint::from_raw(1));
}

#[test]
fn test_readers_never_observe_gaps() {
    const WRITERS: usize = 4;
    const PER_WRITER: u32 = 100;

    let engine = Arc::new(InMemoryEngine::new());
    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let engine = engine.clone();
            thread::spawn(move || {
                for seq in 1..=PER_WRITER {
                    engine
                        .commit(fixtures::attempt(&format!("w{w}"), seq, seq, 1))
                        .unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let engine = engine.clone();
        thread::spawn(move || {
            let total = WRITERS * PER_WRITER as usize;
            loop {
                let seen = engine.get_from_checkpoint(None).unwrap();
                for (i, commit) in seen.iter().enumerate() {
                    assert_eq!(commit.checkpoint().value(), i as u64 + 1, "gap in visible prefix");
                }
                if seen.len() == total {
                    break;
                }
                thread::yield_now();
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();
}

#[test]
fn test_commits_in_separate_buckets_publish_without_stalling() {
    const BUCKETS: usize = 8;
    const PER_BUCKET: u32 = 200;

    let engine = Arc::new(InMemoryEngine::new());
    let start = Arc::new(Barrier::new(BUCKETS));
    let handles: Vec<_> = (0..BUCKETS)
        .map(|b| {
            let engine = engine.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for seq in 1..=PER_BUCKET {
                    engine
                        .commit(fixtures::attempt_in(&format!("bucket-{b}"), "s", seq, seq, 1))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // every publish waited only for lower checkpoints, all of which landed
    assert_eq!(engine.last_checkpoint(), Checkpoint::from_raw(BUCKETS as u64 * PER_BUCKET as u64));
    for b in 0..BUCKETS {
        let read = engine.get_from(&format!("bucket-{b}"), "s", 1, u32::MAX).unwrap();
        assert_eq!(read.len(), PER_BUCKET as usize);
    }
}
