//! Property-based tests for the response broker
//!
//! Scripts of text steps, optionally failing part way, are run through both
//! drivers and the resulting frame sequences checked for shape.

use super::*;
use crate::artifact::{ArtifactPersister, MemorySink, ThreadContext};
use crate::graph::testing::ScriptedGraph;
use crate::graph::ThreadConfig;
use crate::session::ThreadLocks;
use futures::StreamExt;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Clone)]
struct Script {
    texts: Vec<String>,
    fail_after: Option<usize>,
}

impl Script {
    fn graph(&self) -> Arc<ScriptedGraph> {
        let texts: Vec<&str> = self.texts.iter().map(String::as_str).collect();
        let graph = ScriptedGraph::texts(&texts);
        Arc::new(match self.fail_after {
            Some(k) => graph.failing_after(k),
            None => graph,
        })
    }
}

fn arb_script() -> impl Strategy<Value = Script> {
    proptest::collection::vec("[a-z]{1,10}", 0..8).prop_flat_map(|texts| {
        let n = texts.len();
        (Just(texts), proptest::option::of(0..=n))
            .prop_map(|(texts, fail_after)| Script { texts, fail_after })
    })
}

fn broker() -> StreamBroker {
    let persister = ArtifactPersister::new(Arc::new(MemorySink::new()));
    StreamBroker::new(EventNormalizer::new(persister), ThreadLocks::new())
}

fn request() -> BrokerRequest {
    BrokerRequest::new(
        "input".into(),
        ThreadConfig::new("t"),
        ThreadContext::new("t", "/store").unwrap(),
    )
}

fn run_async(script: &Script) -> Vec<StreamFrame> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(broker().stream(script.graph(), request()).collect())
}

fn run_blocking(script: &Script) -> Vec<StreamFrame> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(broker().stream_blocking(script.graph(), request()).collect())
}

fn count(frames: &[StreamFrame], kind: EventKind) -> usize {
    frames
        .iter()
        .filter_map(StreamFrame::event)
        .filter(|e| e.kind == kind)
        .count()
}

/// Shape every response must have, whatever happened upstream
fn assert_well_formed(frames: &[StreamFrame]) -> Result<(), TestCaseError> {
    prop_assert_eq!(frames.last(), Some(&StreamFrame::Done));
    prop_assert_eq!(frames.iter().filter(|f| **f == StreamFrame::Done).count(), 1);
    prop_assert!(count(frames, EventKind::Error) <= 1);
    prop_assert!(count(frames, EventKind::Final) <= 1);
    prop_assert!(count(frames, EventKind::Final) + count(frames, EventKind::Error) == 1);
    for event in frames.iter().filter_map(StreamFrame::event) {
        prop_assert!(!event.content.is_empty());
    }
    // Errors and finals are terminal: only the sentinel follows them
    if let Some(pos) = frames
        .iter()
        .position(|f| f.event().is_some_and(|e| e.kind != EventKind::Intermediate))
    {
        prop_assert_eq!(pos + 2, frames.len());
    }
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_frames_are_well_formed(script in arb_script()) {
        assert_well_formed(&run_async(&script))?;
    }

    /// N steps without failure: N-1 intermediate, then the final, then the sentinel
    #[test]
    fn prop_last_step_is_final(texts in proptest::collection::vec("[a-z]{1,10}", 1..8)) {
        let script = Script { texts: texts.clone(), fail_after: None };
        let frames = run_async(&script);

        let n = texts.len();
        prop_assert_eq!(frames.len(), n + 1);
        for (frame, text) in frames.iter().zip(&texts) {
            let event = frame.event().unwrap();
            prop_assert_eq!(&event.content, text);
        }
        prop_assert_eq!(count(&frames, EventKind::Intermediate), n - 1);
        prop_assert_eq!(frames[n - 1].event().map(|e| e.kind), Some(EventKind::Final));
    }

    /// Failure after k steps: no final, at most k intermediates, one error
    #[test]
    fn prop_failure_is_terminal(texts in proptest::collection::vec("[a-z]{1,10}", 0..8), k in 0usize..8) {
        let k = k.min(texts.len());
        let script = Script { texts, fail_after: Some(k) };
        let frames = run_async(&script);

        prop_assert_eq!(count(&frames, EventKind::Final), 0);
        prop_assert_eq!(count(&frames, EventKind::Error), 1);
        prop_assert!(count(&frames, EventKind::Intermediate) <= k);
        prop_assert_eq!(frames.last(), Some(&StreamFrame::Done));
    }

    /// Both scheduling models produce the same frames
    #[test]
    fn prop_drivers_agree(script in arb_script()) {
        let async_frames = run_async(&script);
        let blocking_frames = run_blocking(&script);
        prop_assert_eq!(async_frames, blocking_frames);
    }
}

#[test]
fn test_empty_source_is_error_then_sentinel() {
    let frames = run_async(&Script {
        texts: vec![],
        fail_after: None,
    });
    assert_eq!(
        frames,
        vec![
            StreamFrame::Event(StreamError::Empty.to_event()),
            StreamFrame::Done
        ]
    );
}
