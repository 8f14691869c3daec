//! Shared test doubles for scheduler and API tests

#![allow(dead_code)]

use async_trait::async_trait;
use kiosk_common::events::{DisplayEvent, PlayPayload};
use kiosk_player::playback::{
    BroadcastSink, DelayPolicy, DurationProbe, DurationResolver, ProbeError, Scheduler,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Broadcast recorded by [`RecordingSink`]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub at: Instant,
    pub id: Uuid,
    pub payload: PlayPayload,
}

/// Sink that forwards every emitted event, timestamped, to a channel
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Recorded>,
}

impl BroadcastSink for RecordingSink {
    fn emit(&self, event: DisplayEvent) {
        let DisplayEvent::Play {
            queue_entry_id,
            payload,
        } = event;
        let _ = self.tx.send(Recorded {
            at: Instant::now(),
            id: queue_entry_id,
            payload,
        });
    }
}

pub fn recording_sink() -> (Arc<RecordingSink>, mpsc::UnboundedReceiver<Recorded>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingSink { tx }), rx)
}

/// Scripted answer for one source
#[derive(Debug, Clone, Copy)]
pub enum ProbeScript {
    Seconds(f64),
    Fail,
    Hang,
}

/// Probe answering from a table; unknown sources fail
#[derive(Default)]
pub struct ScriptedProbe {
    answers: HashMap<String, ProbeScript>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &str, script: ProbeScript) -> Self {
        self.answers.insert(source.to_string(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurationProbe for ScriptedProbe {
    async fn probe(&self, source: &str) -> Result<f64, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(source).copied() {
            Some(ProbeScript::Seconds(s)) => Ok(s),
            Some(ProbeScript::Hang) => std::future::pending().await,
            Some(ProbeScript::Fail) | None => Err(ProbeError::ExitStatus {
                status: "exit status: 1".to_string(),
                stderr: format!("{}: No such file or directory", source),
            }),
        }
    }
}

/// Start a scheduler with the default delay policy and a recording sink
pub fn start_scheduler(
    probe: Arc<ScriptedProbe>,
) -> (Scheduler, JoinHandle<()>, mpsc::UnboundedReceiver<Recorded>) {
    start_scheduler_with(DelayPolicy::default(), probe)
}

/// Start a scheduler with a custom delay policy and a recording sink
pub fn start_scheduler_with(
    policy: DelayPolicy,
    probe: Arc<ScriptedProbe>,
) -> (Scheduler, JoinHandle<()>, mpsc::UnboundedReceiver<Recorded>) {
    let (sink, rx) = recording_sink();
    let resolver = DurationResolver::new(policy, probe);
    let (scheduler, handle) = Scheduler::start(resolver, sink);
    (scheduler, handle, rx)
}

/// Wait for the next broadcast (the paused clock advances while waiting)
pub async fn next_play(rx: &mut mpsc::UnboundedReceiver<Recorded>) -> Recorded {
    tokio::time::timeout(Duration::from_secs(3600), rx.recv())
        .await
        .expect("timed out waiting for play event")
        .expect("sink channel closed")
}

/// Assert `actual` equals `expected` within timer granularity
pub fn assert_gap(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(50),
        "expected gap of ~{}ms, got {:?}",
        expected_ms,
        actual
    );
}
