//! On-screen delay resolution
//!
//! Turns a queue item into the total time it stays current, transition
//! buffer included. Video items without a requested duration are probed
//! with a bounded timeout; any probe failure falls back to a fixed delay.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::probe::{DurationProbe, ProbeError};
use super::queue::QueueItem;
use kiosk_common::events::MediaKind;

/// Default on-screen time for images without a requested duration
pub const DEFAULT_IMAGE_MS: u64 = 5000;
/// Buffer added so clients can finish their transition
pub const DISPLAY_TRANSITION_MS: u64 = 1000;
/// Total delay used when a video's length cannot be probed
pub const DEFAULT_FALLBACK_MS: u64 = 6500;
/// Upper bound on a single duration probe
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Timing constants for delay resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub image_default: Duration,
    pub transition: Duration,
    /// Total delay (transition already included) after a failed probe
    pub fallback_video: Duration,
    pub probe_timeout: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            image_default: Duration::from_millis(DEFAULT_IMAGE_MS),
            transition: Duration::from_millis(DISPLAY_TRANSITION_MS),
            fallback_video: Duration::from_millis(DEFAULT_FALLBACK_MS),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

impl DelayPolicy {
    /// Duration reported back to producers for `item`, transition excluded:
    /// the requested value, the image default, or 0 for a video whose
    /// length is probed at play time.
    pub fn applied_duration_ms(&self, item: &QueueItem) -> u64 {
        match (item.positive_duration_ms(), item.kind()) {
            (Some(ms), _) => ms,
            (None, MediaKind::Image) => self.image_default.as_millis() as u64,
            (None, MediaKind::Video) => 0,
        }
    }
}

/// Which rule produced a delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelaySource {
    /// Caller supplied a positive duration
    Requested,
    /// Image without a usable requested duration
    ImageDefault,
    /// Video length measured by the probe, in seconds
    Probed(f64),
    /// Probe failed or timed out
    Fallback,
}

/// Resolved on-screen time for one item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDelay {
    pub delay: Duration,
    pub source: DelaySource,
}

/// Applies [`DelayPolicy`] to items, probing videos when needed
#[derive(Clone)]
pub struct DurationResolver {
    policy: DelayPolicy,
    probe: Arc<dyn DurationProbe>,
}

impl DurationResolver {
    pub fn new(policy: DelayPolicy, probe: Arc<dyn DurationProbe>) -> Self {
        Self { policy, probe }
    }

    pub fn policy(&self) -> &DelayPolicy {
        &self.policy
    }

    /// Resolve the delay for `item`. Never fails: probe errors become the
    /// fallback delay.
    pub async fn resolve(&self, item: &QueueItem) -> ResolvedDelay {
        if let Some(ms) = item.positive_duration_ms() {
            return ResolvedDelay {
                delay: Duration::from_millis(ms) + self.policy.transition,
                source: DelaySource::Requested,
            };
        }

        match item.kind() {
            MediaKind::Image => ResolvedDelay {
                delay: self.policy.image_default + self.policy.transition,
                source: DelaySource::ImageDefault,
            },
            MediaKind::Video => match self.probe_with_timeout(item.source()).await {
                Ok(seconds) => {
                    debug!("Probed {}: {:.3}s", item.source(), seconds);
                    ResolvedDelay {
                        delay: seconds_to_duration(seconds) + self.policy.transition,
                        source: DelaySource::Probed(seconds),
                    }
                }
                Err(e) => {
                    warn!(
                        "Duration probe failed for {}: {} (using fallback {}ms)",
                        item.source(),
                        e,
                        self.policy.fallback_video.as_millis()
                    );
                    ResolvedDelay {
                        delay: self.policy.fallback_video,
                        source: DelaySource::Fallback,
                    }
                }
            },
        }
    }

    async fn probe_with_timeout(&self, source: &str) -> Result<f64, ProbeError> {
        let seconds = tokio::time::timeout(self.policy.probe_timeout, self.probe.probe(source))
            .await
            .map_err(|_| ProbeError::Timeout(self.policy.probe_timeout))??;

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ProbeError::InvalidDuration(seconds));
        }
        Ok(seconds)
    }
}

/// Whole milliseconds, rounded
fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::from_millis((seconds * 1000.0).round() as u64)
}
