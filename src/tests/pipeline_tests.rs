// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::fixtures;
use crate::memory::InMemoryEngine;
use crate::persistence::{PersistStreams, PersistStreamsExt};
use crate::pipeline::{PipelineDecorator, PipelineHook};
use crate::types::{Checkpoint, Commit};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Hides every commit whose stream id starts with `prefix`.
struct HideStreams {
    prefix: &'static str,
}

impl PipelineHook for HideStreams {
    fn select(&self, commit: Commit) -> Option<Commit> {
        if commit.stream_id().starts_with(self.prefix) {
            None
        } else {
            Some(commit)
        }
    }
}

/// Stamps a header on every commit it sees.
struct Stamp;

impl PipelineHook for Stamp {
    fn select(&self, commit: Commit) -> Option<Commit> {
        let (mut attempt, checkpoint) = commit.into_parts();
        attempt.headers.insert("stamped".into(), json!(true));
        Some(Commit::new(attempt, checkpoint))
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl PipelineHook for Recorder {
    fn select(&self, commit: Commit) -> Option<Commit> {
        self.seen.lock().unwrap().push(format!("select {}", commit.stream_id()));
        Some(commit)
    }

    fn on_purge(&self, bucket_id: Option<&str>) {
        self.seen.lock().unwrap().push(format!("purge {}", bucket_id.unwrap_or("*")));
    }

    fn on_delete_stream(&self, bucket_id: &str, stream_id: &str) {
        self.seen.lock().unwrap().push(format!("delete {bucket_id}/{stream_id}"));
    }
}

#[test]
fn test_vetoed_commits_are_hidden_but_kept() {
    let store = PipelineDecorator::new(
        InMemoryEngine::new(),
        vec![Arc::new(HideStreams { prefix: "secret" }) as Arc<dyn PipelineHook>],
    );
    store.commit(fixtures::attempt("public", 1, 1, 1)).unwrap();
    store.commit(fixtures::attempt("secret-1", 1, 1, 1)).unwrap();

    let visible = store.get_from_start().unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].stream_id(), "public");
    assert!(store.get_stream("secret-1", 0, u32::MAX).unwrap().is_empty());

    // still stored underneath
    assert_eq!(store.inner().get_from_start().unwrap().len(), 2);
}

#[test]
fn test_hooks_run_in_order_and_stop_at_first_veto() {
    let recorder = Arc::new(Recorder::default());
    let store = PipelineDecorator::new(
        InMemoryEngine::new(),
        vec![
            Arc::new(Stamp) as Arc<dyn PipelineHook>,
            Arc::new(HideStreams { prefix: "x" }),
            recorder.clone(),
        ],
    );
    store.commit(fixtures::attempt("a", 1, 1, 1)).unwrap();
    store.commit(fixtures::attempt("x", 1, 1, 1)).unwrap();

    let read = store.get_from_checkpoint(None).unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].headers().get("stamped"), Some(&json!(true)));

    // the recorder never saw the vetoed commit
    assert_eq!(*recorder.seen.lock().unwrap(), vec!["select a".to_string()]);
}

#[test]
fn test_writes_pass_through_untouched() {
    let store = PipelineDecorator::new(InMemoryEngine::new(), vec![Arc::new(Stamp) as Arc<dyn PipelineHook>]);
    let commit = store.commit(fixtures::attempt("a", 1, 1, 1)).unwrap();
    assert!(commit.headers().get("stamped").is_none());
    assert!(store.inner().get_from_start().unwrap()[0].headers().get("stamped").is_none());
}

#[test]
fn test_destructive_operations_notify_hooks() {
    let recorder = Arc::new(Recorder::default());
    let store = PipelineDecorator::new(InMemoryEngine::new(), vec![recorder.clone() as Arc<dyn PipelineHook>]);
    store.commit(fixtures::attempt_in("b", "s", 1, 1, 1)).unwrap();

    store.delete_stream("b", "s").unwrap();
    store.purge_bucket("b").unwrap();
    store.purge().unwrap();
    store.drop_all().unwrap();

    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec!["delete b/s".to_string(), "purge b".to_string(), "purge *".to_string()]
    );
}

#[test]
fn test_page_reads_past_vetoed_runs() {
    let store = PipelineDecorator::new(
        InMemoryEngine::new(),
        vec![Arc::new(HideStreams { prefix: "hidden" }) as Arc<dyn PipelineHook>],
    );
    store.commit(fixtures::attempt("visible-1", 1, 1, 1)).unwrap();
    for i in 0..10 {
        store.commit(fixtures::attempt(&format!("hidden-{i}"), 1, 1, 1)).unwrap();
    }
    store.commit(fixtures::attempt("visible-2", 1, 1, 1)).unwrap();
    store.commit(fixtures::attempt("visible-3", 1, 1, 1)).unwrap();

    let page = store.get_page(Checkpoint::ORIGIN, 3).unwrap();
    let streams: Vec<_> = page.iter().map(|c| c.stream_id().to_string()).collect();
    assert_eq!(streams, vec!["visible-1", "visible-2", "visible-3"]);

    let rest = store.get_page(page[2].checkpoint(), 3).unwrap();
    assert!(rest.is_empty());
}

#[test]
fn test_disposal_is_forwarded() {
    let store = PipelineDecorator::new(InMemoryEngine::new(), Vec::new());
    store.dispose();
    assert!(store.is_disposed());
    assert!(store.inner().is_disposed());
}
