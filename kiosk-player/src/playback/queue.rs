//! Queue store
//!
//! Insertion-ordered FIFO of pending items. The store itself is not
//! synchronized: the scheduler keeps it behind the same mutex as the
//! playback state so that "am I idle" and "pop the head" happen together.

use chrono::{DateTime, Utc};
use kiosk_common::events::{DisplayEvent, MediaKind};
use std::collections::VecDeque;
use tracing::debug;
use uuid::Uuid;

/// One unit of content to display
///
/// Fields are read-only once built; the scheduler never mutates an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    kind: MediaKind,
    source: String,
    caption: String,
    requested_duration_ms: Option<u64>,
}

impl QueueItem {
    /// Create an item. `requested_duration_ms` of None or 0 means "use the
    /// default for this kind" (image default, or probed length for video).
    pub fn new(
        kind: MediaKind,
        source: impl Into<String>,
        caption: impl Into<String>,
        requested_duration_ms: Option<u64>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            caption: caption.into(),
            requested_duration_ms,
        }
    }

    /// Image with the default on-screen time
    pub fn image(source: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::new(MediaKind::Image, source, caption, None)
    }

    /// Video shown for its natural (probed) length
    pub fn video(source: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::new(MediaKind::Video, source, caption, None)
    }

    /// Override the requested duration
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.requested_duration_ms = Some(duration_ms);
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn requested_duration_ms(&self) -> Option<u64> {
        self.requested_duration_ms
    }

    /// Requested duration only when it is a usable positive value
    pub fn positive_duration_ms(&self) -> Option<u64> {
        self.requested_duration_ms.filter(|ms| *ms > 0)
    }
}

/// Queued item plus bookkeeping assigned at enqueue time
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Queue entry UUID
    pub queue_entry_id: Uuid,
    /// When the item was accepted
    pub enqueued_at: DateTime<Utc>,
    /// The item itself
    pub item: QueueItem,
}

impl QueueEntry {
    fn new(item: QueueItem) -> Self {
        Self {
            queue_entry_id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            item,
        }
    }

    /// `play` event announcing this entry
    pub fn play_event(&self) -> DisplayEvent {
        DisplayEvent::play(
            self.queue_entry_id,
            self.item.kind(),
            self.item.source(),
            self.item.caption(),
        )
    }
}

/// FIFO of pending entries
#[derive(Debug, Default)]
pub struct QueueStore {
    entries: VecDeque<QueueEntry>,
}

impl QueueStore {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Never fails.
    pub fn enqueue(&mut self, item: QueueItem) -> QueueEntry {
        let entry = QueueEntry::new(item);
        self.entries.push_back(entry.clone());
        debug!(
            "Enqueued {} {} ({} pending)",
            entry.item.kind(),
            entry.queue_entry_id,
            self.entries.len()
        );
        entry
    }

    /// Remove and return the head, or None when empty
    pub fn dequeue_head(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything still pending, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = QueueStore::new();
        queue.enqueue(QueueItem::image("a.png", "1"));
        queue.enqueue(QueueItem::image("b.png", "2"));
        queue.enqueue(QueueItem::video("c.mp4", "3"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue_head().unwrap().item.source(), "a.png");
        assert_eq!(queue.dequeue_head().unwrap().item.source(), "b.png");
        assert_eq!(queue.dequeue_head().unwrap().item.source(), "c.mp4");
        assert!(queue.dequeue_head().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicates_are_distinct_entries() {
        let mut queue = QueueStore::new();
        let first = queue.enqueue(QueueItem::image("same.png", ""));
        let second = queue.enqueue(QueueItem::image("same.png", ""));

        assert_eq!(first.item, second.item);
        assert_ne!(first.queue_entry_id, second.queue_entry_id);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_positive_duration() {
        assert_eq!(QueueItem::image("a.png", "").positive_duration_ms(), None);
        assert_eq!(
            QueueItem::image("a.png", "").with_duration_ms(0).positive_duration_ms(),
            None
        );
        assert_eq!(
            QueueItem::video("b.mp4", "").with_duration_ms(2500).positive_duration_ms(),
            Some(2500)
        );
    }

    #[test]
    fn test_clear_reports_dropped() {
        let mut queue = QueueStore::new();
        queue.enqueue(QueueItem::image("a.png", ""));
        queue.enqueue(QueueItem::image("b.png", ""));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_play_event_carries_item_fields() {
        let mut queue = QueueStore::new();
        let entry = queue.enqueue(QueueItem::image("a.png", "cap1"));

        match entry.play_event() {
            DisplayEvent::Play { queue_entry_id, payload } => {
                assert_eq!(queue_entry_id, entry.queue_entry_id);
                assert_eq!(payload.kind, MediaKind::Image);
                assert_eq!(payload.src, "a.png");
                assert_eq!(payload.caption, "cap1");
            }
        }
    }
}
