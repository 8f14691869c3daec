//! Playback scheduler
//!
//! Single logical actor that cycles `Idle -> Playing -> Idle` for the life of
//! the process:
//!
//! 1. Under one lock: if idle, pop the queue head and mark it playing.
//! 2. Resolve the on-screen delay (may probe a video, bounded by timeout).
//! 3. Emit exactly one `play` event.
//! 4. Sleep for the delay, go back to idle and repeat.
//!
//! Producers only append and, when the scheduler is idle, wake the driver.
//! The queue and the playback state share one mutex, so the idle check and
//! the dequeue can never interleave with another transition.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::delay::{DelayPolicy, DurationResolver};
use super::queue::{QueueEntry, QueueItem, QueueStore};
use super::sink::BroadcastSink;
use crate::error::{Error, Result};

/// Item currently on screen
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub entry: QueueEntry,
    /// Set once the `play` event went out and the timer is running
    pub armed_at: Option<Instant>,
    pub delay: Option<Duration>,
}

/// Process-wide playback state, owned by the scheduler
#[derive(Debug, Clone, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing(NowPlaying),
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }
}

/// Everything guarded by the scheduler mutex
#[derive(Debug)]
struct SchedulerCore {
    queue: QueueStore,
    state: PlaybackState,
    accepting: bool,
}

struct Inner {
    core: Mutex<SchedulerCore>,
    /// Wakes the driver when an item arrives while idle
    wake: Notify,
    shutdown: watch::Sender<bool>,
    resolver: DurationResolver,
    sink: Arc<dyn BroadcastSink>,
}

/// Handle to the playback scheduler
///
/// Cheap to clone; every clone talks to the same queue and driver.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create the scheduler and spawn its driver task.
    ///
    /// Must be called from within a tokio runtime. The returned handle
    /// completes after [`Scheduler::shutdown`].
    pub fn start(
        resolver: DurationResolver,
        sink: Arc<dyn BroadcastSink>,
    ) -> (Self, JoinHandle<()>) {
        let scheduler = Self::new(resolver, sink);
        let shutdown_rx = scheduler.inner.shutdown.subscribe();
        let driver = scheduler.clone();
        let handle = tokio::spawn(async move { driver.run(shutdown_rx).await });
        (scheduler, handle)
    }

    fn new(resolver: DurationResolver, sink: Arc<dyn BroadcastSink>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(SchedulerCore {
                    queue: QueueStore::new(),
                    state: PlaybackState::Idle,
                    accepting: true,
                }),
                wake: Notify::new(),
                shutdown,
                resolver,
                sink,
            }),
        }
    }

    /// Append an item to the queue.
    ///
    /// Never blocks on playback; the only failure is
    /// [`Error::ShuttingDown`] once [`Scheduler::shutdown`] was called.
    pub fn enqueue(&self, item: QueueItem) -> Result<QueueEntry> {
        let (entry, idle) = {
            let mut core = self.lock_core();
            if !core.accepting {
                return Err(Error::ShuttingDown);
            }
            let entry = core.queue.enqueue(item);
            (entry, core.state.is_idle())
        };

        // A busy scheduler picks the item up when its timer fires
        if idle {
            self.inner.wake.notify_one();
        }
        Ok(entry)
    }

    /// Stop accepting items and stop the driver.
    ///
    /// Pending items are discarded; an armed timer is abandoned.
    pub fn shutdown(&self) {
        let dropped = {
            let mut core = self.lock_core();
            core.accepting = false;
            core.queue.clear()
        };
        self.inner.shutdown.send_replace(true);
        info!("Scheduler shutting down ({} pending items dropped)", dropped);
    }

    /// True when nothing is on screen
    pub fn is_idle(&self) -> bool {
        self.lock_core().state.is_idle()
    }

    /// Number of items waiting behind the current one
    pub fn pending_len(&self) -> usize {
        self.lock_core().queue.len()
    }

    /// False once shutdown started
    pub fn is_accepting(&self) -> bool {
        self.lock_core().accepting
    }

    /// Timing rules the driver applies
    pub fn delay_policy(&self) -> DelayPolicy {
        *self.inner.resolver.policy()
    }

    fn lock_core(&self) -> MutexGuard<'_, SchedulerCore> {
        // State stays consistent even if a holder panicked: every critical
        // section is a handful of field writes.
        self.inner.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Idle -> Playing` test-and-set. Returns the dequeued entry when this
    /// call won the transition.
    fn try_begin(&self) -> Option<QueueEntry> {
        let mut core = self.lock_core();
        if !core.state.is_idle() {
            return None;
        }

        match core.queue.dequeue_head() {
            Some(entry) => {
                core.state = PlaybackState::Playing(NowPlaying {
                    entry: entry.clone(),
                    armed_at: None,
                    delay: None,
                });
                Some(entry)
            }
            None => {
                debug!("Queue empty, scheduler idle");
                None
            }
        }
    }

    /// Record the armed timer on the current item
    fn arm(&self, delay: Duration) {
        if let PlaybackState::Playing(now) = &mut self.lock_core().state {
            now.armed_at = Some(Instant::now());
            now.delay = Some(delay);
        }
    }

    /// Timer fired (or shutdown): back to idle
    fn finish(&self) {
        self.lock_core().state = PlaybackState::Idle;
    }

    /// Driver loop. One iteration per item; parks on `wake` while the queue
    /// is empty.
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Playback scheduler started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.try_begin() {
                Some(entry) => {
                    if !self.play(entry, &mut shutdown_rx).await {
                        break;
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.inner.wake.notified() => {}
                        _ = shutdown_rx.changed() => {}
                    }
                }
            }
        }

        self.finish();
        info!("Playback scheduler stopped");
    }

    /// Resolve, broadcast, wait. Returns false if shutdown interrupted it.
    async fn play(&self, entry: QueueEntry, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        let resolved = tokio::select! {
            resolved = self.inner.resolver.resolve(&entry.item) => resolved,
            _ = shutdown_rx.changed() => return false,
        };

        info!(
            "Playing {} {} ({}) for {}ms [{:?}]",
            entry.item.kind(),
            entry.item.source(),
            entry.queue_entry_id,
            resolved.delay.as_millis(),
            resolved.source
        );

        // Clients hear about the item before its timer exists
        self.inner.sink.emit(entry.play_event());
        self.arm(resolved.delay);

        tokio::select! {
            _ = tokio::time::sleep(resolved.delay) => {}
            _ = shutdown_rx.changed() => return false,
        }

        self.finish();
        debug!("Finished {}", entry.queue_entry_id);
        true
    }
}
