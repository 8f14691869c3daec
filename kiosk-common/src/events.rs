//! Display event types
//!
//! Events pushed to connected display clients. The payload field names
//! (`type`, `src`, `caption`) are the wire contract the display pages read.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Kind of renderable asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image, shown for a fixed duration
    Image,
    /// Video clip, shown for its requested or probed length
    Video,
}

impl MediaKind {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(Error::InvalidInput(format!(
                "unknown media type '{}' (expected 'image' or 'video')",
                other
            ))),
        }
    }
}

/// Body of a `play` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayPayload {
    /// Media kind, serialized as `type`
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Asset location, forwarded verbatim
    pub src: String,
    /// Caption text (may be empty)
    pub caption: String,
}

/// Events broadcast to display clients
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    /// A new item became current; clients should render it now
    Play {
        /// Queue entry this event belongs to (used as the SSE event id)
        queue_entry_id: Uuid,
        /// What to render
        payload: PlayPayload,
    },
}

impl DisplayEvent {
    /// Build a `play` event
    pub fn play(queue_entry_id: Uuid, kind: MediaKind, src: &str, caption: &str) -> Self {
        DisplayEvent::Play {
            queue_entry_id,
            payload: PlayPayload {
                kind,
                src: src.to_string(),
                caption: caption.to_string(),
            },
        }
    }

    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self {
            DisplayEvent::Play { .. } => "play",
        }
    }

    /// Identifier for the SSE `id:` field
    pub fn id(&self) -> Uuid {
        match self {
            DisplayEvent::Play { queue_entry_id, .. } => *queue_entry_id,
        }
    }

    /// JSON body sent to clients in the SSE `data:` field
    pub fn data(&self) -> serde_json::Result<String> {
        match self {
            DisplayEvent::Play { payload, .. } => serde_json::to_string(payload),
        }
    }
}
