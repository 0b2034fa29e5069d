//! Drives a graph's step source and emits the framed response
//!
//! `BrokerCore` is the synchronous state machine shared by both drivers:
//!
//! ```text
//! NotStarted -> Streaming -> Draining -> Terminated
//!      \            \                       ^
//!       `------------`---- failure --------'
//! ```
//!
//! Each step is held one behind. Only once a newer step arrives is the held
//! one known to be intermediate; whatever is held when the source runs dry is
//! final. Every path through the machine ends with exactly one `Done` frame.

use super::error::StreamError;
use super::event::{EventKind, NormalizedEvent, StreamFrame};
use super::normalizer::{EventNormalizer, ResponseHooks};
use crate::artifact::ThreadContext;
use crate::graph::{ConversationGraph, GraphError, StepEvent, SyncConversationGraph, ThreadConfig};
use crate::session::ThreadLocks;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Frames buffered between a blocking worker and its consumer
const WORKER_BUFFER: usize = 16;

pub type FrameStream = BoxStream<'static, StreamFrame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerPhase {
    NotStarted,
    Streaming,
    Draining,
    Terminated,
}

/// Everything one response needs
#[derive(Debug, Clone)]
pub struct BrokerRequest {
    pub request_id: Uuid,
    pub input: String,
    pub config: ThreadConfig,
    pub thread: ThreadContext,
}

impl BrokerRequest {
    pub fn new(input: String, config: ThreadConfig, thread: ThreadContext) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            input,
            config,
            thread,
        }
    }
}

// ============================================================================
// Core state machine
// ============================================================================

pub struct BrokerCore {
    normalizer: EventNormalizer,
    thread: ThreadContext,
    phase: BrokerPhase,
    held: Option<StepEvent>,
    steps: usize,
}

impl BrokerCore {
    pub fn new(normalizer: EventNormalizer, thread: ThreadContext) -> Self {
        Self {
            normalizer,
            thread,
            phase: BrokerPhase::NotStarted,
            held: None,
            steps: 0,
        }
    }

    pub fn phase(&self) -> BrokerPhase {
        self.phase
    }

    /// Steps received so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The step source is open
    pub fn start(&mut self) {
        if self.phase == BrokerPhase::NotStarted {
            self.phase = BrokerPhase::Streaming;
        }
    }

    /// A new step arrived; the previously held one is emitted as intermediate.
    pub fn push(&mut self, event: StepEvent) -> Vec<StreamFrame> {
        if self.phase == BrokerPhase::Terminated {
            return Vec::new();
        }
        self.phase = BrokerPhase::Streaming;
        self.steps += 1;
        match self.held.replace(event) {
            Some(previous) => self
                .normalizer
                .classify(&previous, EventKind::Intermediate, &self.thread)
                .into_iter()
                .map(StreamFrame::Event)
                .collect(),
            None => Vec::new(),
        }
    }

    /// The source failed; the held step is discarded.
    pub fn fail(&mut self, error: GraphError) -> Vec<StreamFrame> {
        if self.phase == BrokerPhase::Terminated {
            return Vec::new();
        }
        tracing::warn!(
            thread_id = %self.thread.thread_id(),
            steps = self.steps,
            error = %error,
            "Graph failed; ending stream with error"
        );
        self.held = None;
        let error = StreamError::from(error);
        self.terminate(vec![error.to_event()])
    }

    /// The source is exhausted; the held step is final.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        if self.phase == BrokerPhase::Terminated {
            return Vec::new();
        }
        self.phase = BrokerPhase::Draining;

        let Some(last) = self.held.take() else {
            tracing::warn!(thread_id = %self.thread.thread_id(), "Graph emitted no events");
            return self.terminate(vec![StreamError::Empty.to_event()]);
        };

        let mut events = self
            .normalizer
            .classify(&last, EventKind::Final, &self.thread);
        if events.is_empty() {
            tracing::warn!(thread_id = %self.thread.thread_id(), "Last step had nothing to show");
            return self.terminate(vec![StreamError::NoFinal.to_event()]);
        }
        // Exactly one final: earlier chunks of the last step stay intermediate
        let last_index = events.len() - 1;
        for event in events.iter_mut().take(last_index) {
            event.kind = EventKind::Intermediate;
        }
        self.terminate(events)
    }

    fn terminate(&mut self, events: Vec<NormalizedEvent>) -> Vec<StreamFrame> {
        self.phase = BrokerPhase::Terminated;
        events
            .into_iter()
            .map(StreamFrame::Event)
            .chain(std::iter::once(StreamFrame::Done))
            .collect()
    }
}

// ============================================================================
// Drivers
// ============================================================================

#[derive(Clone)]
pub struct StreamBroker {
    normalizer: EventNormalizer,
    locks: ThreadLocks,
}

impl StreamBroker {
    pub fn new(normalizer: EventNormalizer, locks: ThreadLocks) -> Self {
        Self { normalizer, locks }
    }

    /// Same thread locks, different output hooks
    #[must_use]
    pub fn with_hooks(&self, hooks: Arc<dyn ResponseHooks>) -> Self {
        Self {
            normalizer: self.normalizer.clone().with_hooks(hooks),
            locks: self.locks.clone(),
        }
    }

    /// Cooperative driver: suspends only while waiting for the thread lock
    /// or the next step.
    pub fn stream(&self, graph: Arc<dyn ConversationGraph>, request: BrokerRequest) -> FrameStream {
        let normalizer = self.normalizer.clone();
        let locks = self.locks.clone();

        Box::pin(async_stream::stream! {
            let BrokerRequest { request_id, input, config, thread } = request;
            let _guard = locks.acquire(thread.thread_id()).await;
            tracing::info!(
                %request_id,
                thread_id = %thread.thread_id(),
                active_threads = locks.active_threads(),
                "Response stream started"
            );

            let mut core = BrokerCore::new(normalizer, thread);
            match graph.stream(input, &config).await {
                Err(e) => {
                    for frame in core.fail(e) {
                        yield frame;
                    }
                }
                Ok(mut steps) => {
                    core.start();
                    loop {
                        let frames = match steps.next().await {
                            Some(Ok(event)) => core.push(event),
                            Some(Err(e)) => core.fail(e),
                            None => core.finish(),
                        };
                        for frame in frames {
                            yield frame;
                        }
                        if core.phase() == BrokerPhase::Terminated {
                            break;
                        }
                    }
                }
            }
            tracing::info!(%request_id, steps = core.steps(), "Response stream finished");
        })
    }

    /// Worker driver: the blocking iterator runs under `spawn_blocking` and
    /// pushes frames through a bounded channel. Dropping the returned stream
    /// stops the worker before its next pull.
    pub fn stream_blocking(
        &self,
        graph: Arc<dyn SyncConversationGraph>,
        request: BrokerRequest,
    ) -> FrameStream {
        let normalizer = self.normalizer.clone();
        let locks = self.locks.clone();

        Box::pin(async_stream::stream! {
            let guard = locks.acquire(request.thread.thread_id()).await;
            tracing::info!(
                request_id = %request.request_id,
                thread_id = %request.thread.thread_id(),
                "Blocking response stream started"
            );

            let (tx, mut rx) = mpsc::channel(WORKER_BUFFER);
            let cancel = CancellationToken::new();
            let _stop_worker = cancel.clone().drop_guard();
            let worker = tokio::task::spawn_blocking(move || {
                run_worker(&*graph, request, normalizer, &tx, &cancel);
                // The thread stays locked until the worker stops pulling steps
                drop(guard);
            });

            let mut terminated = false;
            let mut errored = false;
            while let Some(frame) = rx.recv().await {
                match frame.event() {
                    None => terminated = true,
                    Some(event) if event.is_error() => errored = true,
                    Some(_) => {}
                }
                yield frame;
            }

            if !terminated {
                let reason = match worker.await {
                    Err(e) => e.to_string(),
                    Ok(()) => "exited without finishing".to_string(),
                };
                tracing::error!(reason = %reason, "Blocking response worker stopped early");
                if !errored {
                    yield StreamFrame::Event(StreamError::Worker(reason).to_event());
                }
                yield StreamFrame::Done;
            }
        })
    }
}

fn run_worker(
    graph: &dyn SyncConversationGraph,
    request: BrokerRequest,
    normalizer: EventNormalizer,
    tx: &mpsc::Sender<StreamFrame>,
    cancel: &CancellationToken,
) {
    let BrokerRequest {
        request_id,
        input,
        config,
        thread,
    } = request;
    let mut core = BrokerCore::new(normalizer, thread);

    let steps = match graph.stream(input, &config) {
        Ok(steps) => steps,
        Err(e) => {
            send_all(tx, core.fail(e));
            return;
        }
    };
    core.start();

    for step in steps {
        let frames = match step {
            Ok(event) => core.push(event),
            Err(e) => core.fail(e),
        };
        if !send_all(tx, frames) || cancel.is_cancelled() {
            tracing::info!(%request_id, steps = core.steps(), "Consumer gone; abandoning graph");
            return;
        }
        if core.phase() == BrokerPhase::Terminated {
            break;
        }
    }
    send_all(tx, core.finish());
    tracing::info!(%request_id, steps = core.steps(), "Blocking response stream finished");
}

/// False once the consumer has gone away
fn send_all(tx: &mpsc::Sender<StreamFrame>, frames: Vec<StreamFrame>) -> bool {
    frames.into_iter().all(|frame| tx.blocking_send(frame).is_ok())
}

/// Final-only consumption: the content of the final event, or the error that
/// ended the stream.
pub async fn collect_final<S>(frames: S) -> Result<String, StreamError>
where
    S: Stream<Item = StreamFrame>,
{
    let mut frames = std::pin::pin!(frames);
    let mut last_final = None;
    while let Some(frame) = frames.next().await {
        match frame {
            StreamFrame::Event(event) => match event.kind {
                EventKind::Final => last_final = Some(event.content),
                EventKind::Error => return Err(StreamError::Reported(event.content)),
                EventKind::Intermediate => {}
            },
            StreamFrame::Done => break,
        }
    }
    last_final.ok_or(StreamError::NoFinal)
}
