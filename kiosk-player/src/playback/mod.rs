//! Playback scheduling
//!
//! Queue store, duration resolution, broadcast contract and the scheduler
//! that ties them together.

pub mod delay;
pub mod probe;
pub mod queue;
pub mod scheduler;
pub mod sink;

pub use delay::{DelayPolicy, DelaySource, DurationResolver, ResolvedDelay};
pub use probe::{DurationProbe, FfprobeProbe, ProbeError};
pub use queue::{QueueEntry, QueueItem, QueueStore};
pub use scheduler::{NowPlaying, PlaybackState, Scheduler};
pub use sink::BroadcastSink;
